//! Headless-browser bootstrap seam.
//!
//! Workday and Eightfold gate their JSON APIs behind cookies (and for Workday
//! a CSRF token) that only a real page load hands out. The concrete browser
//! lives outside this crate; adapters consume the [`BrowserClient`] trait and
//! receive an immutable [`BrowserSession`] value.

use async_trait::async_trait;
use cookie::Cookie;

use crate::error::Result;

/// The artifacts of one bootstrapped page load. Passed by value to request
/// builders; never mutated after creation.
#[derive(Debug, Clone)]
pub struct BrowserSession {
    /// Origin the session cookies are valid for
    pub base_url: String,
    /// Cookie name/value pairs captured from the page load
    pub cookies: Vec<(String, String)>,
    /// CSRF token when the platform requires one (Workday)
    pub csrf_token: Option<String>,
    /// Tenant domain when the platform exposes one (Eightfold)
    pub domain: Option<String>,
}

impl BrowserSession {
    /// Render the captured cookies as a `Cookie` request header value.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let header = self
            .cookies
            .iter()
            .map(|(name, value)| Cookie::new(name.clone(), value.clone()).to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }
}

/// Bootstrap interface implemented outside this crate.
#[async_trait]
pub trait BrowserClient: Send + Sync {
    /// Load `url` in a headless browser and capture session artifacts.
    /// Returns `Ok(None)` when the page loaded but yielded no usable session.
    async fn bootstrap(&self, url: &str) -> Result<Option<BrowserSession>>;

    /// Release browser resources at shutdown.
    async fn close(&self);
}
