//! Exponential backoff retry helper (§7): `initialBackoff ·
//! backoffMultiplier^k` up to `maxRetries` attempts, no jitter (the
//! specification defines none).

use std::future::Future;
use std::time::Duration;

/// Retries `op` up to `max_retries` additional times after the first
/// attempt, sleeping `initial_backoff * multiplier^k` between
/// attempts. Returns the first success, or the last error once
/// retries are exhausted.
pub async fn retry<T, E, F, Fut>(
    max_retries: u32,
    initial_backoff: Duration,
    multiplier: f64,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_retries => return Err(err),
            Err(_) => {
                let backoff = backoff_for_attempt(initial_backoff, multiplier, attempt);
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

/// `initial_backoff * multiplier^attempt`, used directly by tests that
/// assert the schedule without sleeping through it.
#[must_use]
pub fn backoff_for_attempt(initial_backoff: Duration, multiplier: f64, attempt: u32) -> Duration {
    let scale = multiplier.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
    Duration::from_secs_f64(initial_backoff.as_secs_f64() * scale)
}
