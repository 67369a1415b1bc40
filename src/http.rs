//! HTTP client wrapper that honors local and upstream rate limits.
//!
//! The wrapper consults the local limiter before a request leaves the
//! process, so a denied action never costs a network round trip, and it
//! recognizes upstream throttling (HTTP 429) on the way back. Both
//! outcomes surface as distinguished errors; everything else passes
//! through untouched. Retrying and rendering are the caller's business.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Request, Response, StatusCode};
use tracing::{debug, warn};

use crate::error::{FloodgateError, Result};
use crate::ratelimit::{RateLimiter, DEFAULT_IDENTIFIER};

/// Upstream header carrying the epoch second at which quota resets.
const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// A `reqwest::Client` front that enforces the local rule table first.
///
/// Build arbitrary requests with [`inner`](Self::inner) and hand them to
/// [`execute`](Self::execute); requests sent directly on the inner client
/// bypass the guard.
#[derive(Clone)]
pub struct GuardedClient {
    limiter: Arc<RateLimiter>,
    http: Client,
}

impl GuardedClient {
    /// Wrap a default `reqwest::Client`.
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            http: Client::new(),
        }
    }

    /// Wrap an existing client (custom timeouts, proxies, TLS).
    pub fn with_client(limiter: Arc<RateLimiter>, http: Client) -> Self {
        Self { limiter, http }
    }

    /// The unguarded inner client, for building requests.
    pub fn inner(&self) -> &Client {
        &self.http
    }

    /// The limiter this client consults.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Send `request` on behalf of `(action, identifier)`.
    ///
    /// The local window is checked, and a slot consumed, before anything
    /// touches the network. A local denial comes back as
    /// [`FloodgateError::Throttled`]; an upstream 429 as
    /// [`FloodgateError::UpstreamThrottled`] with whatever retry hint the
    /// response headers carry.
    pub async fn execute(
        &self,
        action: &str,
        identifier: &str,
        request: Request,
    ) -> Result<Response> {
        let decision = self.limiter.check(action, identifier)?;
        if !decision.allowed {
            debug!(action = %action, "Local rate limit refused the request");
            return Err(FloodgateError::Throttled {
                action: action.to_string(),
                message: decision
                    .message
                    .unwrap_or_else(|| "Too many requests. Please try again later.".to_string()),
                retry_after: decision.retry_after.unwrap_or_default(),
            });
        }

        let response = self.http.execute(request).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after_hint(response.headers());
            warn!(action = %action, retry_after = ?retry_after, "Upstream returned 429");
            return Err(FloodgateError::UpstreamThrottled { retry_after });
        }

        Ok(response)
    }

    /// Guarded GET against the shared `"default"` pool.
    pub async fn get(&self, action: &str, url: &str) -> Result<Response> {
        let request = self.http.get(url).build()?;
        self.execute(action, DEFAULT_IDENTIFIER, request).await
    }
}

/// Pull a retry hint out of upstream rate limit headers.
///
/// Prefers `Retry-After` in seconds form (decimals accepted, some
/// services send them), then falls back to `X-RateLimit-Reset` as an
/// epoch second. HTTP-date forms are not parsed; a value we cannot read,
/// or that will not fit a `Duration`, falls through to the next source.
pub fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    if let Some(value) = headers.get(RETRY_AFTER) {
        if let Some(secs) = value.to_str().ok().and_then(|v| v.trim().parse::<f64>().ok()) {
            if let Ok(hint) = Duration::try_from_secs_f64(secs) {
                return Some(hint);
            }
        }
    }

    if let Some(value) = headers.get(X_RATELIMIT_RESET) {
        if let Some(reset) = value.to_str().ok().and_then(|v| v.trim().parse::<i64>().ok()) {
            let now = Utc::now().timestamp();
            return Some(Duration::from_secs(reset.saturating_sub(now).max(0) as u64));
        }
    }

    None
}
