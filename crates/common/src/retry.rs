//! Small retry helper for the try-sleep-try-again shapes scattered through
//! engine implementations.

use std::{future::Future, time::Duration};
use tokio::time;

/// How often and how patiently to retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Try, wait 100ms, try once more.
    pub const fn once_more() -> Self {
        Self { max_attempts: 2, backoff: Duration::from_millis(100) }
    }
}

/// Outcome classification an operation reports back to [`retry`].
#[derive(Debug)]
pub enum Attempt<E> {
    /// Worth another try under the policy.
    Transient(E),
    /// Retrying cannot help; fail now.
    Permanent(E),
}

/// Runs `op` until it succeeds, fails permanently, or the policy is
/// exhausted. The final transient error is returned as-is.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(Attempt::Permanent(err)) => return Err(err),
            Err(Attempt::Transient(err)) if attempt == attempts => return Err(err),
            Err(Attempt::Transient(_)) => {
                debug!(attempt, max = attempts, "transient failure, retrying");
                time::sleep(policy.backoff).await;
            }
        }
    }
    unreachable!("retry loop always returns")
}
