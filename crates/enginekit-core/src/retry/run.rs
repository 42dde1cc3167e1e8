use std::future::Future;

use super::classify::Retryable;
use super::policy::{RetryDecision, RetryPolicy};

/// Runs `op` until it succeeds or the policy gives up, sleeping between attempts.
/// `what` only labels the log lines.
pub async fn run_with_retry<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt, e.retry_kind()) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "{} failed: {}; retrying",
                        what,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            },
        }
    }
}
