//! Retry middleware for transient HTTP failures.
//!
//! Retries connect errors, timeouts, and 5xx responses with exponential
//! backoff plus jitter. 403/429 are deliberately excluded: rate-limit
//! responses must reach the adapter, which owns the adaptive reaction
//! (shrinking detail batches, stretching delays).

use http::Extensions;
use rand::Rng;
use reqwest::{Request, Response};
use reqwest_middleware::{Error, Middleware, Next, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Retry knobs for one request. Adapters override the client default by
/// attaching a policy to the request extensions.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

/// HTTP statuses worth retrying: transient server conditions.
const RETRYABLE_STATUSES: &[u16] = &[408, 500, 502, 503, 504];

pub struct RetryMiddleware {
    default_policy: RetryPolicy,
}

impl RetryMiddleware {
    pub fn new(default_policy: RetryPolicy) -> Self {
        Self { default_policy }
    }

    /// Exponential backoff with jitter: `base * 2^attempt` plus up to half of
    /// `base` of random spread.
    fn backoff(&self, policy: &RetryPolicy, attempt: u32) -> Duration {
        let base = policy.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_cap = (policy.base_delay / 2).as_millis() as u64;
        let jitter = if jitter_cap == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_cap)
        };
        base + Duration::from_millis(jitter)
    }
}

fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Reqwest(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        Error::Middleware(_) => false,
    }
}

#[async_trait::async_trait]
impl Middleware for RetryMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let policy = extensions
            .get::<RetryPolicy>()
            .copied()
            .unwrap_or(self.default_policy);

        let mut attempt = 0u32;
        loop {
            // A non-clonable (streaming) body cannot be retried
            let retry_req = req.try_clone();

            let current = match retry_req {
                Some(clone) => clone,
                None => return next.run(req, extensions).await,
            };

            let result = next.clone().run(current, extensions).await;

            let should_retry = match &result {
                Ok(response) => RETRYABLE_STATUSES.contains(&response.status().as_u16()),
                Err(error) => is_retryable_error(error),
            };

            if !should_retry || attempt >= policy.retries {
                return result;
            }

            let delay = self.backoff(&policy, attempt);
            match &result {
                Ok(response) => debug!(
                    status = response.status().as_u16(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying transient response"
                ),
                Err(error) => debug!(
                    error = %error,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying transport error"
                ),
            }
            sleep(delay).await;
            attempt += 1;
        }
    }
}
