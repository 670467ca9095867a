//! HTTP transport seam for platform adapters.
//!
//! Adapters consume the [`HttpClient`] trait so tests can inject canned
//! transports; the production implementation is [`ReqwestClient`], a reqwest
//! client wrapped in middleware that retries transient failures with
//! exponential backoff. 403 and 429 responses are never retried here: they are
//! surfaced so adapters can treat them as rate-limit signals and adapt.

pub mod retry;

pub use retry::{RetryMiddleware, RetryPolicy};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::error::{Result, ScraperError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Per-request knobs. Unset fields fall back to the client's [`HttpConfig`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub base_delay: Option<Duration>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A completed HTTP exchange. The body is fully buffered: job boards return
/// payloads measured in kilobytes, not streams.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 403 || self.status == 429
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    /// Deserialize the body, reporting a short window of the payload around
    /// the failure instead of dumping the whole response into logs.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|err| ScraperError::Parse(decode_error_context(&self.body, &err)))
    }
}

/// Bytes of payload shown on either side of a decode failure.
const SNIPPET_RADIUS: usize = 60;

/// Describe a JSON decode failure with the payload text around it.
///
/// Board APIs return minified single-line JSON, so serde's line/column alone
/// is useless for eyeballing what went wrong; a short window around the error
/// offset is what actually helps. Snippet bounds are snapped to char
/// boundaries: several boards embed non-ASCII location and title text.
fn decode_error_context(body: &str, err: &serde_json::Error) -> String {
    // serde reports a 1-based line/column; walk the newlines to a byte offset
    let mut offset = 0usize;
    for (index, line) in body.split('\n').enumerate() {
        if index + 1 == err.line() {
            offset += err.column().saturating_sub(1).min(line.len());
            break;
        }
        offset += line.len() + 1;
    }
    let offset = offset.min(body.len());

    let mut start = offset.saturating_sub(SNIPPET_RADIUS);
    let mut end = (offset + SNIPPET_RADIUS).min(body.len());
    while start > 0 && !body.is_char_boundary(start) {
        start -= 1;
    }
    while end < body.len() && !body.is_char_boundary(end) {
        end += 1;
    }

    let prefix = if start > 0 { "…" } else { "" };
    let suffix = if end < body.len() { "…" } else { "" };
    format!("{err} near: {prefix}{}{suffix}", &body[start..end])
}

/// The transport surface adapters talk to.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute a request as described by `options`.
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse>;

    async fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse> {
        let options = options.clone().with_method(HttpMethod::Get);
        self.fetch(url, &options).await
    }

    async fn post(&self, url: &str, body: Value, options: &RequestOptions) -> Result<HttpResponse> {
        let options = options
            .clone()
            .with_method(HttpMethod::Post)
            .with_body(body);
        self.fetch(url, &options).await
    }
}

/// Production [`HttpClient`] backed by reqwest + [`RetryMiddleware`].
pub struct ReqwestClient {
    client: reqwest_middleware::ClientWithMiddleware,
    config: HttpConfig,
}

impl ReqwestClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent())
            .tcp_keepalive(Some(Duration::from_secs(5 * 60)))
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScraperError::Network(format!("failed to create HTTP client: {e}")))?;

        let default_policy = RetryPolicy {
            retries: config.retries,
            base_delay: config.base_delay,
        };
        let client = reqwest_middleware::ClientBuilder::new(inner)
            .with(RetryMiddleware::new(default_policy))
            .build();

        Ok(Self { client, config })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse> {
        let mut builder = match options.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };

        if let Some(body) = &options.body {
            builder = builder.json(body);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        let policy = RetryPolicy {
            retries: options.retries.unwrap_or(self.config.retries),
            base_delay: options.base_delay.unwrap_or(self.config.base_delay),
        };
        let response = builder
            .with_extension(policy)
            .send()
            .await
            .map_err(|e| classify_send_error(e, options.timeout.unwrap_or(self.config.timeout)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ScraperError::Network(format!("failed to read body: {e}")))?;

        Ok(HttpResponse::new(status, body))
    }
}

fn classify_send_error(error: reqwest_middleware::Error, timeout: Duration) -> ScraperError {
    match &error {
        reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => ScraperError::Timeout(timeout),
        _ => ScraperError::Network(error.to_string()),
    }
}

/// Browser-like user agent; several boards reject the default reqwest one.
pub fn user_agent() -> &'static str {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
}
