//! Retry with exponential backoff for outbound HTTP calls
//!
//! Shared by the Telegram and Gemini clients. The operation decides per
//! attempt whether a failure is worth retrying; anything it returns as `Err`
//! is final.

use std::future::Future;
use std::time::{Duration, SystemTime};

use crate::{Error, Result};

/// Retry policy for outbound API calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits (for tests)
    #[must_use]
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Outcome of one attempt
#[derive(Debug)]
pub enum Attempt<T> {
    /// Finished; stop retrying
    Done(T),
    /// Transient failure; try again after backoff or the server's hint
    Retry {
        reason: String,
        retry_after: Option<Duration>,
    },
}

/// Whether an HTTP status and body indicate a transient failure
#[must_use]
pub fn is_recoverable(status: u16, body: &str) -> bool {
    if status == 429 || (500..600).contains(&status) {
        return true;
    }

    let lower = body.to_lowercase();
    lower.contains("connection reset") || lower.contains("timed out") || lower.contains("dns error")
}

/// Whether a transport error is worth retrying
#[must_use]
pub fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Server-provided wait hint
///
/// Reads Telegram's `parameters.retry_after` from a JSON body, or a numeric
/// `Retry-After` header value.
#[must_use]
pub fn parse_retry_after(body: &str, header: Option<&str>) -> Option<Duration> {
    if let Some(secs) = header.and_then(|h| h.trim().parse::<u64>().ok()) {
        return Some(Duration::from_secs(secs));
    }

    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    let secs = v.get("parameters")?.get("retry_after")?.as_u64()?;
    Some(Duration::from_secs(secs))
}

/// Delay before the next attempt
///
/// `retry_after` wins when present (capped at `max_delay`); otherwise
/// `min(base_delay * 2^attempt + jitter, max_delay)` with 0-25% jitter taken
/// from the system clock.
#[must_use]
pub fn delay_for_attempt(
    policy: &RetryPolicy,
    attempt: u32,
    retry_after: Option<Duration>,
) -> Duration {
    if let Some(ra) = retry_after {
        return ra.min(policy.max_delay);
    }

    let base = policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(policy.max_delay);

    let jitter_nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let jitter = base.mul_f64(f64::from(jitter_nanos % 250) / 1000.0);

    (base + jitter).min(policy.max_delay)
}

/// Run `op` until it returns `Done`, an error, or the retries run out
///
/// `exhausted` builds the error reported after the last transient failure.
///
/// # Errors
///
/// Returns the first non-transient error, or `exhausted(reason)` once
/// `policy.max_retries` retries have failed
pub async fn run<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    exhausted: impl Fn(String) -> Error,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    let mut attempt = 0;
    loop {
        match op().await? {
            Attempt::Done(value) => return Ok(value),
            Attempt::Retry {
                reason,
                retry_after,
            } => {
                if attempt >= policy.max_retries {
                    return Err(exhausted(format!(
                        "{label}: {reason} (gave up after {} retries)",
                        policy.max_retries
                    )));
                }
                let delay = delay_for_attempt(policy, attempt, retry_after);
                tracing::warn!(
                    call = label,
                    attempt = attempt + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    reason = %reason,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
