//! Bounded retry with exponential backoff and jitter.
//!
//! Every provider call goes through [`retry_with_backoff`]. An error is
//! retried only if its HTTP status is in the policy's retryable set, or if it
//! is a transient transport failure (connect, timeout). A server-supplied
//! `Retry-After` hint replaces the computed delay.

use std::fmt::Display;
use std::time::Duration;

use reqwest::header::HeaderMap;
use tokio::time::sleep;
use tracing::warn;

/// What the retry loop needs to know about an error.
pub trait Retryable {
    /// HTTP status, if the error came from a response.
    fn status(&self) -> Option<u16>;

    /// Server-supplied delay hint.
    fn retry_after(&self) -> Option<Duration>;

    /// Failures without a status that are still worth retrying.
    fn is_transient(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Down-jitter: delays are scaled by a factor in `[1 - jitter_factor, 1]`.
    pub jitter_factor: f64,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
            retryable_statuses: vec![408, 409, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_retryable<E: Retryable>(&self, error: &E) -> bool {
        error.status().map_or_else(
            || error.is_transient(),
            |status| self.retryable_statuses.contains(&status),
        )
    }

    /// Backoff before retry number `backoff_step + 1`, before jitter.
    #[must_use]
    pub fn base_delay(&self, backoff_step: u32) -> Duration {
        let factor = 2_u32.saturating_pow(backoff_step);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Delay to wait, honoring a valid server hint over the computed backoff.
    #[must_use]
    pub fn delay_for(&self, backoff_step: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint.filter(|h| *h > Duration::ZERO && *h < Duration::from_secs(60)) {
            return hint;
        }
        let jitter = rand::random::<f64>().mul_add(-self.jitter_factor.clamp(0.0, 1.0), 1.0);
        self.base_delay(backoff_step).mul_f64(jitter)
    }
}

/// Parse `Retry-After-Ms` (float milliseconds) or `Retry-After` (integer
/// seconds).
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(delay) = headers
        .get("retry-after-ms")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
    {
        return Some(delay);
    }

    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Retry an async operation according to `policy`.
///
/// Returns the first success, or the last error once the error is not
/// retryable or the attempts are exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= max_attempts || !policy.is_retryable(&e) {
                    return Err(e);
                }
                let delay = policy.delay_for(attempt - 1, e.retry_after());
                warn!(
                    "Request failed (attempt {}/{}): {e}. Retrying after {}ms...",
                    attempt,
                    max_attempts,
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
