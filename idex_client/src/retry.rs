//! Bounded exponential-backoff retry for panel calls.
//!
//! The panel rate limits aggressively, so every network operation in this crate runs under [`with_retry`].
//! Backoff doubles on each attempt, with a little jitter so that concurrent cabinet syncs do not fall into
//! lockstep against the panel.
use std::{future::Future, time::Duration};

use log::*;
use rand::Rng;

use crate::PanelApiError;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, base_delay: DEFAULT_BASE_DELAY }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay }
    }

    /// Delay before the retry that follows failed attempt number `attempt` (zero-based): `base * 2^attempt`
    /// plus up to a quarter of the base delay in jitter.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let jitter_ceiling = (self.base_delay / 4).as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..=jitter_ceiling);
        exponential + Duration::from_millis(jitter)
    }
}

/// Runs `op` until it succeeds, fails permanently, or the attempt ceiling is reached.
///
/// Rate-limit errors and generic transient failures are retried with exponential backoff. Errors classified
/// permanent by [`PanelApiError::is_permanent`] (notably credential rejection) propagate immediately, since
/// retrying a bad password cannot succeed. Exhausting all attempts yields
/// [`PanelApiError::RetriesExhausted`] naming the operation and the attempt count.
pub async fn with_retry<T, F, Fut>(operation: &str, policy: RetryPolicy, mut op: F) -> Result<T, PanelApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PanelApiError>>,
{
    let mut last_error = None;
    for attempt in 0..policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_permanent() => {
                debug!("🔁️ {operation} failed permanently, not retrying: {e}");
                return Err(e);
            },
            Err(e) => {
                let retrying = attempt + 1 < policy.max_attempts;
                if retrying {
                    let delay = policy.delay_for(attempt);
                    if e.is_rate_limited() {
                        warn!(
                            "🔁️ {operation} was rate limited on attempt {}/{}. Backing off for {delay:?}",
                            attempt + 1,
                            policy.max_attempts
                        );
                    } else {
                        warn!(
                            "🔁️ {operation} failed on attempt {}/{}: {e}. Retrying in {delay:?}",
                            attempt + 1,
                            policy.max_attempts
                        );
                    }
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                } else {
                    last_error = Some(e);
                }
            },
        }
    }
    let source = last_error.unwrap_or_else(|| PanelApiError::FetchFailed("no attempts were made".to_string()));
    Err(PanelApiError::RetriesExhausted {
        operation: operation.to_string(),
        attempts: policy.max_attempts,
        source: Box::new(source),
    })
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(5, Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_twice_then_success() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result = with_retry("test op", policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(PanelApiError::RateLimited)
                } else {
                    Ok(42u32)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two backoff waits: 100ms + 200ms, each with at most 25ms of jitter.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "elapsed: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "elapsed: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn auth_rejection_is_never_retried() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result: Result<(), _> = with_retry("login", policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PanelApiError::AuthRejected) }
        })
        .await;
        assert!(matches!(result, Err(PanelApiError::AuthRejected)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_operation_and_attempts() {
        let result: Result<(), _> = with_retry("page fetch", RetryPolicy::new(3, Duration::from_millis(10)), || async {
            Err(PanelApiError::FetchFailed("boom".to_string()))
        })
        .await;
        match result {
            Err(PanelApiError::RetriesExhausted { operation, attempts, source }) => {
                assert_eq!(operation, "page fetch");
                assert_eq!(attempts, 3);
                assert!(matches!(*source, PanelApiError::FetchFailed(_)));
            },
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }
}
