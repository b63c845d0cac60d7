//! Evaluation Cache Module
//!
//! Cache-aside evaluation: serve a fresh cached result if there is one,
//! otherwise ask the remote evaluator and remember the answer.
//!
//! Concurrent misses on the same key are not coalesced. Each may call the
//! remote evaluator; the last `put` wins. Reads never wait on a fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::cache::{cache_key, normalize_user_id, CacheStats, TtlCache};
use crate::config::CacheConfig;
use crate::error::{FlagError, Result};
use crate::models::EvaluationResult;
use crate::remote::RemoteEvaluator;
use crate::tasks::{spawn_sweep_task, SweepHandle};

// == Evaluation Cache ==
/// TTL cache of evaluation results in front of a [`RemoteEvaluator`].
pub struct EvaluationCache {
    cache: Arc<TtlCache<String, EvaluationResult>>,
    remote: Arc<dyn RemoteEvaluator>,
    sweeper: Mutex<SweepHandle>,
    shutdown_grace: Duration,
}

impl EvaluationCache {
    // == Constructor ==
    /// Creates the cache and starts its background sweep.
    ///
    /// Fails with `FlagError::InvalidConfig` when the sweep interval is zero
    /// or no tokio runtime is running.
    pub fn new(remote: Arc<dyn RemoteEvaluator>, config: &CacheConfig) -> Result<Self> {
        let cache = Arc::new(TtlCache::new(config.ttl));
        let sweeper = spawn_sweep_task(cache.clone(), config.sweep_interval)?;

        Ok(Self {
            cache,
            remote,
            sweeper: Mutex::new(sweeper),
            shutdown_grace: config.shutdown_grace,
        })
    }

    // == Evaluate ==
    /// Evaluates one flag for one user, from cache when fresh.
    ///
    /// `NotFound` and failed evaluations are never cached.
    pub async fn evaluate(&self, flag_key: &str, user_id: Option<&str>) -> Result<EvaluationResult> {
        let user_id = normalize_user_id(user_id);
        let key = cache_key(flag_key, user_id);

        if let Some(cached) = self.cache.get(&key) {
            trace!("Cache hit for flag: {}, user: {:?}", flag_key, user_id);
            return Ok(cached);
        }

        trace!("Cache miss for flag: {}, user: {:?}", flag_key, user_id);
        let result = self
            .remote
            .evaluate_one(flag_key, user_id)
            .await
            .map_err(classify)?;

        self.cache.put(key, result.clone());
        Ok(result)
    }

    // == Evaluate All ==
    /// Evaluates every flag for one user, always remotely.
    ///
    /// Each returned result is written into the cache under the same key a
    /// single evaluation would use, warming later `evaluate` calls.
    pub async fn evaluate_all(&self, user_id: Option<&str>) -> Result<HashMap<String, EvaluationResult>> {
        let user_id = normalize_user_id(user_id);

        let results = self
            .remote
            .evaluate_all(user_id)
            .await
            .map_err(classify)?;

        for (flag_key, result) in &results {
            self.cache.put(cache_key(flag_key, user_id), result.clone());
        }

        debug!("Evaluated {} flags for user: {:?}", results.len(), user_id);
        Ok(results)
    }

    // == Invalidate ==
    /// Drops the cached evaluation of one flag for one user.
    pub fn invalidate(&self, flag_key: &str, user_id: Option<&str>) {
        self.cache.invalidate(&cache_key(flag_key, user_id));
        debug!("Invalidated cache for flag: {}, user: {:?}", flag_key, user_id);
    }

    // == Clear ==
    /// Drops every cached evaluation.
    pub fn clear(&self) {
        self.cache.clear();
        debug!("Cleared all cached flags");
    }

    // == Size ==
    /// Number of cached evaluations, stale ones included.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    // == Stats ==
    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // == Shutdown ==
    /// Stops the sweep (bounded by the configured grace period) and clears
    /// the cache. Safe to call repeatedly.
    ///
    /// Evaluation keeps working afterwards; stale entries are then only
    /// removed on read.
    pub async fn shutdown(&self) {
        self.sweeper.lock().await.shutdown(self.shutdown_grace).await;
        self.cache.clear();
    }

    /// Returns true while the background sweep is running.
    pub async fn is_sweeping(&self) -> bool {
        self.sweeper.lock().await.is_running()
    }
}

/// Keeps the three remote failure kinds apart and folds anything else into
/// the generic evaluation failure.
fn classify(err: FlagError) -> FlagError {
    match err {
        FlagError::NotFound(_) | FlagError::Authentication(_) | FlagError::Evaluation(_) => err,
        other => FlagError::Evaluation(anyhow::Error::new(other).context("Remote evaluator failed")),
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use crate::models::FlagValue;

    /// Scripted evaluator that counts calls.
    #[derive(Default)]
    struct FakeEvaluator {
        flags: HashMap<String, EvaluationResult>,
        fail_with: Option<fn() -> FlagError>,
        delay: Duration,
        one_calls: AtomicUsize,
        all_calls: AtomicUsize,
    }

    impl FakeEvaluator {
        fn with_flags(flags: Vec<EvaluationResult>) -> Self {
            Self {
                flags: flags.into_iter().map(|r| (r.flag_key.clone(), r)).collect(),
                ..Self::default()
            }
        }

        fn failing(fail_with: fn() -> FlagError) -> Self {
            Self {
                fail_with: Some(fail_with),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RemoteEvaluator for FakeEvaluator {
        async fn evaluate_one(&self, flag_key: &str, _user_id: Option<&str>) -> Result<EvaluationResult> {
            self.one_calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            self.flags
                .get(flag_key)
                .cloned()
                .ok_or_else(|| FlagError::NotFound(flag_key.to_string()))
        }

        async fn evaluate_all(&self, _user_id: Option<&str>) -> Result<HashMap<String, EvaluationResult>> {
            self.all_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(self.flags.clone())
        }
    }

    fn config(ttl: Duration) -> CacheConfig {
        CacheConfig {
            ttl,
            sweep_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(1),
        }
    }

    fn setup(fake: FakeEvaluator) -> (Arc<FakeEvaluator>, EvaluationCache) {
        let fake = Arc::new(fake);
        let cache = EvaluationCache::new(fake.clone(), &config(Duration::from_secs(30))).unwrap();
        (fake, cache)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (fake, cache) = setup(FakeEvaluator::with_flags(vec![EvaluationResult::new("f", true)]));

        let first = assert_ok!(cache.evaluate("f", Some("u")).await);
        let second = assert_ok!(cache.evaluate("f", Some("u")).await);

        assert_eq!(first, second);
        assert_eq!(fake.one_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_users_do_not_share_entries() {
        let (fake, cache) = setup(FakeEvaluator::with_flags(vec![EvaluationResult::new("f", true)]));

        assert_ok!(cache.evaluate("f", Some("u1")).await);
        assert_ok!(cache.evaluate("f", Some("u2")).await);

        assert_eq!(fake.one_calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_absent_and_empty_user_are_the_same_entry() {
        let (fake, cache) = setup(FakeEvaluator::with_flags(vec![EvaluationResult::new("f", true)]));

        assert_ok!(cache.evaluate("f", None).await);
        assert_ok!(cache.evaluate("f", Some("")).await);

        assert_eq!(fake.one_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let fake = Arc::new(FakeEvaluator::with_flags(vec![EvaluationResult::new("f", 1i64)]));
        let cache = EvaluationCache::new(fake.clone(), &config(Duration::from_millis(50))).unwrap();

        assert_ok!(cache.evaluate("f", None).await);
        tokio::time::sleep(Duration::from_millis(90)).await;
        assert_ok!(cache.evaluate("f", None).await);

        assert_eq!(fake.one_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let (fake, cache) = setup(FakeEvaluator::default());

        let err = assert_err!(cache.evaluate("missing", Some("u")).await);
        assert!(matches!(err, FlagError::NotFound(ref key) if key == "missing"));
        assert!(cache.is_empty());

        assert_err!(cache.evaluate("missing", Some("u")).await);
        assert_eq!(fake.one_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_authentication_failure_propagates_unchanged() {
        let (_, cache) = setup(FakeEvaluator::failing(|| {
            FlagError::Authentication("Invalid or missing API key".into())
        }));

        let err = assert_err!(cache.evaluate("f", None).await);
        assert!(err.is_authentication());

        let err = assert_err!(cache.evaluate_all(None).await);
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn test_unexpected_error_kinds_become_evaluation_failures() {
        let (_, cache) = setup(FakeEvaluator::failing(|| FlagError::InvalidConfig("oops".into())));

        let err = assert_err!(cache.evaluate("f", None).await);
        assert!(matches!(err, FlagError::Evaluation(_)));
    }

    #[tokio::test]
    async fn test_concurrent_misses_both_fetch_and_agree() {
        let fake = FakeEvaluator {
            delay: Duration::from_millis(50),
            ..FakeEvaluator::with_flags(vec![EvaluationResult::new("f", "blue")])
        };
        let (fake, cache) = setup(fake);
        let cache = Arc::new(cache);

        let a = tokio::spawn({
            let cache = cache.clone();
            async move { cache.evaluate("f", Some("u")).await }
        });
        let b = tokio::spawn({
            let cache = cache.clone();
            async move { cache.evaluate("f", Some("u")).await }
        });

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert_eq!(a.value, b.value);
        assert!(fake.one_calls.load(Ordering::SeqCst) >= 1);

        let stored = assert_ok!(cache.evaluate("f", Some("u")).await);
        assert_eq!(stored.value, FlagValue::Str("blue".into()));
    }

    #[tokio::test]
    async fn test_evaluate_all_warms_single_lookups() {
        let (fake, cache) = setup(FakeEvaluator::with_flags(vec![
            EvaluationResult::new("a", true),
            EvaluationResult::new("b", "x"),
        ]));

        let all = assert_ok!(cache.evaluate_all(Some("u")).await);
        assert_eq!(all.len(), 2);

        let a = assert_ok!(cache.evaluate("a", Some("u")).await);
        assert_eq!(a.value, FlagValue::Bool(true));
        assert_eq!(fake.one_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_evaluate_all_always_goes_remote() {
        let (fake, cache) = setup(FakeEvaluator::with_flags(vec![EvaluationResult::new("a", true)]));

        assert_ok!(cache.evaluate_all(None).await);
        assert_ok!(cache.evaluate_all(None).await);

        assert_eq!(fake.all_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_exactly_one_refetch() {
        let (fake, cache) = setup(FakeEvaluator::with_flags(vec![EvaluationResult::new("f", true)]));

        assert_ok!(cache.evaluate("f", Some("u")).await);
        cache.invalidate("f", Some("u"));
        assert_ok!(cache.evaluate("f", Some("u")).await);
        assert_ok!(cache.evaluate("f", Some("u")).await);

        assert_eq!(fake.one_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_absent_and_clear_empty_are_noops() {
        let (_, cache) = setup(FakeEvaluator::default());

        cache.invalidate("nothing", None);
        cache.clear();

        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_clear_drops_all_users_and_flags() {
        let (fake, cache) = setup(FakeEvaluator::with_flags(vec![
            EvaluationResult::new("a", true),
            EvaluationResult::new("b", false),
        ]));

        assert_ok!(cache.evaluate("a", Some("u1")).await);
        assert_ok!(cache.evaluate("b", Some("u2")).await);
        cache.clear();

        assert!(cache.is_empty());
        assert_ok!(cache.evaluate("a", Some("u1")).await);
        assert_eq!(fake.one_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shutdown_stops_sweep_and_clears() {
        let (_, cache) = setup(FakeEvaluator::with_flags(vec![EvaluationResult::new("f", true)]));

        assert_ok!(cache.evaluate("f", None).await);
        assert!(cache.is_sweeping().await);

        cache.shutdown().await;
        assert!(!cache.is_sweeping().await);
        assert!(cache.is_empty());

        cache.shutdown().await;
        assert!(!cache.is_sweeping().await);
    }

    #[tokio::test]
    async fn test_zero_sweep_interval_rejected() {
        let fake = Arc::new(FakeEvaluator::default());
        let zero_interval = CacheConfig {
            sweep_interval: Duration::ZERO,
            ..config(Duration::from_secs(30))
        };

        let result = EvaluationCache::new(fake, &zero_interval);

        assert!(matches!(result, Err(FlagError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_cached_result_keeps_variant() {
        let (fake, cache) = setup(FakeEvaluator::with_flags(vec![
            EvaluationResult::new("checkout", "B").with_variant("variant-b"),
        ]));

        assert_ok!(cache.evaluate("checkout", Some("u")).await);
        let cached = assert_ok!(cache.evaluate("checkout", Some("u")).await);

        assert_eq!(cached.variant_id.as_deref(), Some("variant-b"));
        assert_eq!(fake.one_calls.load(Ordering::SeqCst), 1);
    }
}
