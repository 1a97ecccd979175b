//! The Knowledge Retriever: validate, query with retries, rank, degrade.

use ferrodesk_core::error::RetrievalError;
use ferrodesk_core::knowledge::{KnowledgeSource, RetrievalOutcome, RetrievalResult};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Bounded retry with capped exponential backoff and ±25% jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based: the wait after the first failure is `delay(1)`).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base_ms = self.base_delay.as_millis() as u64;
        let capped_ms = base_ms
            .saturating_mul(2u64.pow(exp))
            .min(self.max_delay.as_millis() as u64);
        Duration::from_millis(apply_jitter(capped_ms))
    }
}

fn apply_jitter(base_ms: u64) -> u64 {
    let range = base_ms / 4;
    if range == 0 {
        return base_ms;
    }
    let low = base_ms - range;
    let high = base_ms + range;
    rand::rng().random_range(low..=high)
}

/// Keep results scoring at least `min_score`, best first, at most `max_results`.
///
/// Results with a NaN score never pass the threshold. Ties keep source order.
pub fn rank_results(
    mut results: Vec<RetrievalResult>,
    max_results: usize,
    min_score: f32,
) -> Vec<RetrievalResult> {
    results.retain(|r| r.score >= min_score);
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(max_results);
    results
}

fn validate(query: &str, max_results: usize, min_score: f32) -> Result<(), RetrievalError> {
    if query.trim().is_empty() {
        return Err(RetrievalError::InvalidParameters("query cannot be empty".into()));
    }
    if max_results == 0 {
        return Err(RetrievalError::InvalidParameters("max_results must be > 0".into()));
    }
    if !(0.0..=1.0).contains(&min_score) {
        return Err(RetrievalError::InvalidParameters(format!(
            "min_score must be between 0 and 1, got {min_score}"
        )));
    }
    Ok(())
}

/// Queries a knowledge source and never fails.
pub struct KnowledgeRetriever {
    source: Arc<dyn KnowledgeSource>,
    attempt_timeout: Duration,
    retry: RetryPolicy,
    deadline: Option<Duration>,
}

impl KnowledgeRetriever {
    pub fn new(source: Arc<dyn KnowledgeSource>) -> Self {
        Self {
            source,
            attempt_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
            deadline: None,
        }
    }

    /// Upper bound on a single attempt.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Upper bound on a whole `retrieve` call, retries and backoff included.
    ///
    /// Attempts are shortened and retries skipped so the call returns
    /// `Unavailable` before the deadline passes.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Run one knowledge query.
    ///
    /// Invalid parameters and exhausted retries both yield
    /// `RetrievalOutcome::Unavailable`; a reachable source with nothing
    /// above `min_score` yields an empty `Found`.
    pub async fn retrieve(&self, query: &str, max_results: usize, min_score: f32) -> RetrievalOutcome {
        if let Err(e) = validate(query, max_results, min_score) {
            warn!("Rejected knowledge query: {e}");
            return RetrievalOutcome::Unavailable(e);
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let started = Instant::now();
        let remaining = |deadline: Duration| deadline.saturating_sub(started.elapsed());
        let mut attempt = 0;
        loop {
            attempt += 1;
            let attempt_timeout = match self.deadline {
                Some(deadline) => self.attempt_timeout.min(remaining(deadline)),
                None => self.attempt_timeout,
            };
            let result = match tokio::time::timeout(attempt_timeout, self.source.query(query, max_results)).await {
                Ok(result) => result,
                Err(_) => Err(RetrievalError::Timeout(format!(
                    "no response after {}s",
                    attempt_timeout.as_secs_f32()
                ))),
            };

            match result {
                Ok(raw) => {
                    let candidates = raw.len();
                    let ranked = rank_results(raw, max_results, min_score);
                    debug!(
                        source = self.source.name(),
                        attempt,
                        candidates,
                        kept = ranked.len(),
                        "Knowledge query complete"
                    );
                    return RetrievalOutcome::Found(ranked);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay(attempt);
                    if self.deadline.is_some_and(|deadline| remaining(deadline) <= delay) {
                        warn!(source = self.source.name(), attempt, "Knowledge retrieval out of time: {e}");
                        return RetrievalOutcome::Unavailable(e);
                    }
                    warn!(
                        source = self.source.name(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Knowledge query failed, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(source = self.source.name(), attempt, "Knowledge source unavailable: {e}");
                    return RetrievalOutcome::Unavailable(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource(Vec<RetrievalResult>);

    #[async_trait]
    impl KnowledgeSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn query(&self, _query: &str, _max: usize) -> Result<Vec<RetrievalResult>, RetrievalError> {
            Ok(self.0.clone())
        }
    }

    /// Fails with `error` for the first `failures` calls, then succeeds.
    struct FlakySource {
        calls: AtomicUsize,
        failures: usize,
        error: RetrievalError,
    }

    #[async_trait]
    impl KnowledgeSource for FlakySource {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn query(&self, _query: &str, _max: usize) -> Result<Vec<RetrievalResult>, RetrievalError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(vec![RetrievalResult::new("recovered", 0.9, "faq.md")])
            }
        }
    }

    struct SlowSource;

    #[async_trait]
    impl KnowledgeSource for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }
        async fn query(&self, _query: &str, _max: usize) -> Result<Vec<RetrievalResult>, RetrievalError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(vec![])
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn candidates() -> Vec<RetrievalResult> {
        vec![
            RetrievalResult::new("low", 0.05, "a"),
            RetrievalResult::new("mid", 0.5, "b"),
            RetrievalResult::new("high", 0.9, "c"),
            RetrievalResult::new("mid-high", 0.7, "d"),
        ]
    }

    #[test]
    fn rank_filters_sorts_and_truncates() {
        let ranked = rank_results(candidates(), 2, 0.1);
        let contents: Vec<_> = ranked.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["high", "mid-high"]);
    }

    #[test]
    fn rank_with_threshold_above_everything_is_empty() {
        assert!(rank_results(candidates(), 10, 0.95).is_empty());
    }

    #[test]
    fn rank_drops_nan_scores() {
        let ranked = rank_results(vec![RetrievalResult::new("nan", f32::NAN, "x")], 5, 0.0);
        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn min_score_above_all_candidates_returns_empty_found() {
        let retriever = KnowledgeRetriever::new(Arc::new(FixedSource(candidates())));
        let outcome = retriever.retrieve("pagos", 15, 0.99).await;
        assert!(!outcome.is_unavailable());
        assert!(outcome.results().is_empty());
    }

    #[tokio::test]
    async fn invalid_parameters_are_unavailable_not_panics() {
        let retriever = KnowledgeRetriever::new(Arc::new(FixedSource(candidates())));
        for (query, max, min) in [("", 5, 0.1), ("q", 0, 0.1), ("q", 5, 1.5), ("q", 5, -0.1)] {
            let outcome = retriever.retrieve(query, max, min).await;
            assert!(matches!(
                outcome.error(),
                Some(RetrievalError::InvalidParameters(_))
            ));
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
            failures: 2,
            error: RetrievalError::Network("connection reset".into()),
        });
        let retriever = KnowledgeRetriever::new(source.clone()).with_retry_policy(fast_retry(3));
        let outcome = retriever.retrieve("pagos", 5, 0.1).await;
        assert_eq!(outcome.results().len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
            failures: usize::MAX,
            error: RetrievalError::Network("connection refused".into()),
        });
        let retriever = KnowledgeRetriever::new(source.clone()).with_retry_policy(fast_retry(3));
        let outcome = retriever.retrieve("pagos", 5, 0.1).await;
        assert!(outcome.is_unavailable());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auth_failures_are_not_retried() {
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
            failures: usize::MAX,
            error: RetrievalError::AuthenticationFailed("bad key".into()),
        });
        let retriever = KnowledgeRetriever::new(source.clone()).with_retry_policy(fast_retry(3));
        let outcome = retriever.retrieve("pagos", 5, 0.1).await;
        assert!(outcome.is_unavailable());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out() {
        let retriever = KnowledgeRetriever::new(Arc::new(SlowSource))
            .with_attempt_timeout(Duration::from_secs(1))
            .with_retry_policy(fast_retry(1));
        let outcome = retriever.retrieve("pagos", 5, 0.1).await;
        assert!(matches!(outcome.error(), Some(RetrievalError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_bounds_the_whole_call() {
        let retriever = KnowledgeRetriever::new(Arc::new(SlowSource)).with_deadline(Duration::from_secs(135));
        let started = Instant::now();
        let outcome = retriever.retrieve("pagos", 5, 0.1).await;

        assert!(matches!(outcome.error(), Some(RetrievalError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(136), "{:?}", started.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_skips_retries_it_cannot_fit() {
        let source = Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
            failures: usize::MAX,
            error: RetrievalError::Network("connection refused".into()),
        });
        let retriever = KnowledgeRetriever::new(source.clone())
            .with_retry_policy(RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(10),
                max_delay: Duration::from_secs(10),
            })
            .with_deadline(Duration::from_secs(5));

        assert!(retriever.retrieve("pagos", 5, 0.1).await.is_unavailable());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(3000),
        };
        let first = policy.delay(1).as_millis();
        assert!((750..=1250).contains(&first), "first delay {first}");
        let second = policy.delay(2).as_millis();
        assert!((1500..=2500).contains(&second), "second delay {second}");
        for attempt in 3..10 {
            assert!(policy.delay(attempt).as_millis() <= 3750);
        }
    }
}
