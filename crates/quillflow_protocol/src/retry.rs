//! Client-side retry decorator for transport failures.
//!
//! Wraps the call that opens (or re-opens) an event stream. Retries
//! are a caller concern: the server-side state machine never retries,
//! so backoff lives here, decoupled from run semantics. The caller
//! supplies the transient/permanent classification, mirroring the
//! worker convention that only transient failures are retry eligible.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff policy for transient transport failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Ceiling on the per-retry delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, retry_index: u32) -> Duration {
        let factor = 1u32 << retry_index.min(16);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, a permanent error occurs, or attempts
/// run out. `is_transient` decides whether an error is retry
/// eligible; permanent errors are returned immediately.
pub async fn with_retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    mut op: F,
    is_transient: C,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts || !is_transient(&err) {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt - 1);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "transport attempt failed, retrying: {err}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
