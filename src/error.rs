//! Error types for the scrape pipeline.

use std::time::Duration;

/// Classified failure causes carried by [`ScraperError`].
///
/// The split matters for callers: retryable codes indicate the HTTP layer
/// already exhausted its retries (or the server is actively throttling),
/// non-retryable codes indicate the request itself is wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScraperErrorCode {
    InvalidUrl,
    BoardNotFound,
    ParseError,
    AuthRequired,
    CsrfError,
    RateLimited,
    NetworkError,
    Timeout,
    BrowserError,
    Unknown,
}

impl ScraperErrorCode {
    /// Whether a fresh attempt could plausibly succeed without operator action.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::NetworkError | Self::Timeout | Self::BrowserError
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("board not found: {0}")]
    BoardNotFound(String),
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("authentication required: {0}")]
    AuthRequired(String),
    #[error("CSRF token missing or rejected: {0}")]
    Csrf(String),
    #[error("rate limited (status {status})")]
    RateLimited { status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("browser bootstrap failed: {0}")]
    Browser(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScraperError {
    pub fn code(&self) -> ScraperErrorCode {
        match self {
            Self::InvalidUrl(_) => ScraperErrorCode::InvalidUrl,
            Self::BoardNotFound(_) => ScraperErrorCode::BoardNotFound,
            Self::Parse(_) => ScraperErrorCode::ParseError,
            Self::AuthRequired(_) => ScraperErrorCode::AuthRequired,
            Self::Csrf(_) => ScraperErrorCode::CsrfError,
            Self::RateLimited { .. } => ScraperErrorCode::RateLimited,
            Self::Network(_) => ScraperErrorCode::NetworkError,
            Self::Timeout(_) => ScraperErrorCode::Timeout,
            Self::Browser(_) => ScraperErrorCode::BrowserError,
            Self::Other(_) => ScraperErrorCode::Unknown,
        }
    }
}

pub type Result<T, E = ScraperError> = std::result::Result<T, E>;
