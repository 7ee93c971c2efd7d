//! Shared exchange-rate store with time-based refresh.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn, Instrument};
use voyage_common::{Clock, Currency, SystemClock, Timestamp};

use crate::config::RateStoreConfig;
use crate::conversion::{Conversion, Converter};
use crate::error::{FxError, FxResult};
use crate::provider::{HttpRateSource, RateSource};
use crate::snapshot::{RateSnapshot, SnapshotOrigin, BASE_CURRENCY};

/// Holds the in-flight flag for one refresh task and clears it when the task
/// ends, whether it succeeds, fails or panics.
struct RefreshGuard {
    inner: Arc<StoreInner>,
}

impl RefreshGuard {
    async fn run(self) -> FxResult<Arc<RateSnapshot>> {
        self.inner.fetch_and_swap().await
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.inner.refreshing.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct RefreshCounters {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

/// State shared between the store and its refresh tasks.
struct StoreInner {
    source: Arc<dyn RateSource>,
    clock: Arc<dyn Clock>,
    config: RateStoreConfig,
    snapshot: RwLock<Arc<RateSnapshot>>,
    refreshing: AtomicBool,
    last_refresh_failed: AtomicBool,
    counters: RefreshCounters,
}

impl StoreInner {
    fn snapshot(&self) -> Arc<RateSnapshot> {
        self.snapshot.read().clone()
    }

    async fn fetch_and_swap(&self) -> FxResult<Arc<RateSnapshot>> {
        self.counters.attempts.fetch_add(1, Ordering::Relaxed);
        let base = Currency::new(BASE_CURRENCY);
        let timeout = self.config.request_timeout;

        let result = match tokio::time::timeout(timeout, self.source.fetch_rates(&base)).await {
            Ok(result) => result,
            Err(_) => Err(FxError::Timeout(format!(
                "{} gave no answer within {:?}",
                self.source.name(),
                timeout
            ))),
        };

        match result {
            Ok(remote) => {
                let snapshot = Arc::new(RateSnapshot::merged(remote, self.clock.now()));
                *self.snapshot.write() = snapshot.clone();
                self.last_refresh_failed.store(false, Ordering::Release);
                self.counters.successes.fetch_add(1, Ordering::Relaxed);

                info!(
                    source = self.source.name(),
                    currencies = snapshot.len(),
                    "Exchange rates refreshed"
                );
                Ok(snapshot)
            }
            Err(e) => {
                self.last_refresh_failed.store(true, Ordering::Release);
                self.counters.failures.fetch_add(1, Ordering::Relaxed);

                warn!(
                    source = self.source.name(),
                    error = %e,
                    "Exchange rate refresh failed, keeping current rates"
                );
                Err(e)
            }
        }
    }
}

/// Owner of the current [`RateSnapshot`].
///
/// Starts on the built-in fallback table. [`RateStore::ensure_fresh`] refreshes
/// it from the rate source at most once per cache window; failed refreshes
/// keep the previous snapshot. Share one store between consumers with `Arc`.
///
/// Refreshes run on their own task: a caller that stops waiting does not
/// cancel the fetch, and the snapshot is still updated when it completes.
pub struct RateStore {
    inner: Arc<StoreInner>,
}

impl RateStore {
    /// Create a store reading the wall clock.
    pub fn new(source: Arc<dyn RateSource>, config: RateStoreConfig) -> Self {
        Self::with_clock(source, Arc::new(SystemClock), config)
    }

    /// Create a store with an explicit clock.
    pub fn with_clock(
        source: Arc<dyn RateSource>,
        clock: Arc<dyn Clock>,
        config: RateStoreConfig,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                source,
                clock,
                config,
                snapshot: RwLock::new(Arc::new(RateSnapshot::fallback())),
                refreshing: AtomicBool::new(false),
                last_refresh_failed: AtomicBool::new(false),
                counters: RefreshCounters::default(),
            }),
        }
    }

    /// Validate `config` and create a store backed by the HTTP rate API.
    pub fn from_config(config: RateStoreConfig) -> FxResult<Self> {
        config.validate().map_err(FxError::Configuration)?;
        let source = HttpRateSource::new(config.clone())?;
        Ok(Self::new(Arc::new(source), config))
    }

    pub fn config(&self) -> &RateStoreConfig {
        &self.inner.config
    }

    /// The current snapshot. Never performs I/O.
    pub fn snapshot(&self) -> Arc<RateSnapshot> {
        self.inner.snapshot()
    }

    /// Check if the last successful refresh is within the cache window.
    pub fn is_fresh(&self) -> bool {
        self.snapshot()
            .is_fresh(self.inner.clock.now(), self.inner.config.cache_ttl)
    }

    /// Check if a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.load(Ordering::Acquire)
    }

    /// Check if the most recent refresh attempt failed.
    pub fn last_refresh_failed(&self) -> bool {
        self.inner.last_refresh_failed.load(Ordering::Acquire)
    }

    /// Make sure the rates are reasonably current and return them.
    ///
    /// Returns the cached snapshot without I/O when it is within the cache
    /// window (unless `force_refresh`) or when another refresh is already in
    /// flight. Otherwise fetches once; on failure the previous snapshot is
    /// kept and returned, and the next call tries again.
    #[instrument(skip(self))]
    pub async fn ensure_fresh(&self, force_refresh: bool) -> Arc<RateSnapshot> {
        if !force_refresh && !self.is_refreshing() && self.is_fresh() {
            debug!("Using cached rates");
            return self.snapshot();
        }

        match self.spawn_refresh() {
            Some(task) => match task.await {
                Ok(Ok(snapshot)) => snapshot,
                Ok(Err(_)) => self.snapshot(),
                Err(e) => {
                    warn!(error = %e, "Refresh task failed");
                    self.snapshot()
                }
            },
            None => {
                debug!("Refresh already in flight, using current rates");
                self.snapshot()
            }
        }
    }

    /// Refresh now and report failures to the caller.
    ///
    /// State changes are the same as for a forced [`RateStore::ensure_fresh`].
    /// When a refresh is already in flight the current snapshot is returned.
    pub async fn refresh(&self) -> FxResult<Arc<RateSnapshot>> {
        let Some(task) = self.spawn_refresh() else {
            debug!("Refresh already in flight, using current rates");
            return Ok(self.snapshot());
        };

        task.await
            .map_err(|e| FxError::Internal(format!("Refresh task failed: {}", e)))?
    }

    /// Converter over the current snapshot.
    pub fn converter(&self) -> Converter {
        Converter::new(self.snapshot()).with_stale(self.last_refresh_failed())
    }

    /// Convert with the current snapshot; see [`Converter::convert`].
    pub fn convert(&self, amount: f64, from: &str, to: &str) -> f64 {
        self.converter().convert(amount, from, to)
    }

    /// Convert with the current snapshot; see [`Converter::convert_detailed`].
    pub fn convert_detailed(&self, amount: f64, from: &str, to: &str) -> Conversion {
        self.converter().convert_detailed(amount, from, to)
    }

    /// Store statistics.
    pub fn status(&self) -> RateStoreStatus {
        let snapshot = self.snapshot();
        let now = self.inner.clock.now();
        let counters = &self.inner.counters;

        RateStoreStatus {
            origin: snapshot.origin(),
            refreshed_at: snapshot.refreshed_at(),
            age_seconds: snapshot.age(now).map(|age| age.num_seconds()),
            currencies: snapshot.len(),
            fresh: snapshot.is_fresh(now, self.inner.config.cache_ttl),
            refreshing: self.is_refreshing(),
            last_refresh_failed: self.last_refresh_failed(),
            refresh_attempts: counters.attempts.load(Ordering::Relaxed),
            refresh_successes: counters.successes.load(Ordering::Relaxed),
            refresh_failures: counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Claim the in-flight flag and start a refresh task, or return `None`
    /// if another refresh holds the flag.
    fn spawn_refresh(&self) -> Option<JoinHandle<FxResult<Arc<RateSnapshot>>>> {
        self.inner
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let guard = RefreshGuard {
            inner: self.inner.clone(),
        };
        Some(tokio::spawn(guard.run().in_current_span()))
    }
}

/// Snapshot of store state for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RateStoreStatus {
    pub origin: SnapshotOrigin,
    pub refreshed_at: Option<Timestamp>,
    pub age_seconds: Option<i64>,
    pub currencies: usize,
    pub fresh: bool,
    pub refreshing: bool,
    pub last_refresh_failed: bool,
    pub refresh_attempts: u64,
    pub refresh_successes: u64,
    pub refresh_failures: u64,
}

/// Shared rate store.
pub type SharedRateStore = Arc<RateStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::ConversionStatus;
    use crate::provider::MockRateSource;
    use crate::snapshot::FALLBACK_RATES;
    use chrono::Duration;
    use voyage_common::{now, ManualClock};

    fn setup(rates: &[(&str, f64)]) -> (RateStore, Arc<MockRateSource>, Arc<ManualClock>) {
        let source = Arc::new(MockRateSource::with_rates(rates));
        let clock = Arc::new(ManualClock::new(now()));
        let store = RateStore::with_clock(source.clone(), clock.clone(), RateStoreConfig::default());
        (store, source, clock)
    }

    #[test]
    fn test_starts_on_fallback() {
        let (store, source, _) = setup(&[]);
        let snapshot = store.snapshot();

        assert_eq!(snapshot.origin(), SnapshotOrigin::Fallback);
        assert_eq!(snapshot.len(), FALLBACK_RATES.len());
        assert!(!store.is_fresh());
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn test_identity_without_fetch() {
        let (store, source, _) = setup(&[]);

        for (code, _) in FALLBACK_RATES {
            assert_eq!(store.convert(123.45, code, code), 123.45);
        }
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_remote_rates_override_fallback() {
        let (store, _, _) = setup(&[("EUR", 1.0), ("TND", 3.5)]);

        store.ensure_fresh(false).await;

        assert_eq!(store.convert(1.0, "EUR", "TND"), 3.5);
        assert_eq!(store.snapshot().rate("USD"), Some(1.08));
        assert_eq!(store.snapshot().origin(), SnapshotOrigin::Remote);
        assert!(store.is_fresh());
    }

    #[tokio::test]
    async fn test_cache_hit_within_window() {
        let (store, source, clock) = setup(&[("TND", 3.5)]);

        let first = store.ensure_fresh(false).await;
        clock.advance(Duration::minutes(59));
        let second = store.ensure_fresh(false).await;

        assert_eq!(source.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_refresh_after_window() {
        let (store, source, clock) = setup(&[("TND", 3.5)]);

        store.ensure_fresh(false).await;
        clock.advance(Duration::hours(1));
        source.set_rate("TND", 3.6);
        store.ensure_fresh(false).await;

        assert_eq!(source.calls(), 2);
        assert_eq!(store.convert(1.0, "EUR", "TND"), 3.6);
        assert_eq!(store.snapshot().refreshed_at(), Some(clock.now()));
    }

    #[tokio::test]
    async fn test_force_refresh_within_window() {
        let (store, source, _) = setup(&[("TND", 3.5)]);

        store.ensure_fresh(false).await;
        store.ensure_fresh(true).await;

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_snapshot_and_retries() {
        let (store, source, clock) = setup(&[("TND", 3.5)]);

        let good = store.ensure_fresh(false).await;
        let refreshed_at = good.refreshed_at();

        clock.advance(Duration::hours(2));
        source.set_failing(true);
        let after_failure = store.ensure_fresh(false).await;

        assert!(Arc::ptr_eq(&good, &after_failure));
        assert_eq!(store.snapshot().refreshed_at(), refreshed_at);
        assert_eq!(store.convert(1.0, "EUR", "TND"), 3.5);
        assert!(store.last_refresh_failed());
        assert!(!store.is_refreshing());

        // No false cache window after a failure: the next call goes out again.
        store.ensure_fresh(false).await;
        assert_eq!(source.calls(), 3);

        source.set_failing(false);
        store.ensure_fresh(false).await;
        assert!(!store.last_refresh_failed());
        assert_eq!(store.snapshot().refreshed_at(), Some(clock.now()));
    }

    #[tokio::test]
    async fn test_initial_failure_uses_fallback() {
        let (store, source, _) = setup(&[]);
        source.set_failing(true);

        let snapshot = store.ensure_fresh(false).await;

        assert_eq!(snapshot.origin(), SnapshotOrigin::Fallback);
        assert!(snapshot.refreshed_at().is_none());
        assert!((store.convert(100.0, "EUR", "TND") - 330.0).abs() < 1e-9);

        store.ensure_fresh(false).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_conversion_after_failure() {
        let (store, source, _) = setup(&[]);
        source.set_failing(true);
        store.ensure_fresh(false).await;

        let conversion = store.convert_detailed(100.0, "EUR", "TND");
        assert_eq!(conversion.status, ConversionStatus::Stale);
        assert!(!conversion.is_reliable());

        source.set_failing(false);
        store.ensure_fresh(false).await;
        let conversion = store.convert_detailed(100.0, "EUR", "TND");
        assert_eq!(conversion.status, ConversionStatus::Converted);
    }

    #[tokio::test]
    async fn test_refresh_reports_errors() {
        let (store, source, _) = setup(&[]);
        source.set_failing(true);

        let result = store.refresh().await;

        assert!(matches!(result, Err(FxError::Network(_))));
        assert_eq!(store.snapshot().origin(), SnapshotOrigin::Fallback);
        assert!(!store.is_refreshing());
    }

    #[tokio::test]
    async fn test_in_flight_refresh_not_duplicated() {
        let (store, source, _) = setup(&[("TND", 3.5)]);
        source.pause();

        let (first, second) = tokio::join!(
            store.ensure_fresh(false),
            async {
                while source.calls() == 0 {
                    tokio::task::yield_now().await;
                }
                assert!(store.is_refreshing());
                let snapshot = store.ensure_fresh(true).await;
                source.resume();
                snapshot
            }
        );

        assert_eq!(source.calls(), 1);
        assert_eq!(second.origin(), SnapshotOrigin::Fallback);
        assert_eq!(first.rate("TND"), Some(3.5));
        assert!(!store.is_refreshing());
    }

    #[tokio::test]
    async fn test_refresh_while_in_flight_returns_current() {
        let (store, source, _) = setup(&[("TND", 3.5)]);
        source.pause();

        let (first, second) = tokio::join!(store.refresh(), async {
            while source.calls() == 0 {
                tokio::task::yield_now().await;
            }
            let result = store.refresh().await;
            source.resume();
            result
        });

        let second = tokio_test::assert_ok!(second);
        assert_eq!(second.origin(), SnapshotOrigin::Fallback);
        let first = tokio_test::assert_ok!(first);
        assert_eq!(first.rate("TND"), Some(3.5));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_completes_after_caller_gives_up() {
        let (store, source, _) = setup(&[("TND", 3.5)]);
        source.pause();

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            store.ensure_fresh(false),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(store.is_refreshing());

        source.resume();
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while store.is_refreshing() {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(store.snapshot().origin(), SnapshotOrigin::Remote);
        assert_eq!(store.snapshot().rate("TND"), Some(3.5));
        assert_eq!(store.status().refresh_successes, 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let source = Arc::new(MockRateSource::new());
        let config = RateStoreConfig {
            request_timeout: std::time::Duration::from_millis(20),
            ..Default::default()
        };
        let store = RateStore::new(source.clone(), config);
        source.pause();

        let result = store.refresh().await;

        assert!(matches!(result, Err(FxError::Timeout(_))));
        assert!(!store.is_refreshing());
        assert!(store.last_refresh_failed());
    }

    #[tokio::test]
    async fn test_status_counters() {
        let (store, source, clock) = setup(&[("TND", 3.5)]);

        store.ensure_fresh(false).await;
        source.set_failing(true);
        store.ensure_fresh(true).await;
        clock.advance(Duration::minutes(10));

        let status = store.status();
        assert_eq!(status.refresh_attempts, 2);
        assert_eq!(status.refresh_successes, 1);
        assert_eq!(status.refresh_failures, 1);
        assert_eq!(status.age_seconds, Some(600));
        assert_eq!(status.origin, SnapshotOrigin::Remote);
        assert!(status.fresh);
        assert!(status.last_refresh_failed);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = RateStoreConfig {
            rate_api_base: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            RateStore::from_config(config),
            Err(FxError::Configuration(_))
        ));
    }

    #[test]
    fn test_store_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RateStore>();
    }
}
