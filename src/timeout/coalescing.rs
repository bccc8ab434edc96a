//! Coalescing timeout provider.
//!
//! Requests whose deadlines fall into the same tolerance window share one
//! underlying timer. The bucket map only ever holds windows that have not
//! fired yet: each entry is removed by its own timer's callback, so the map
//! stays bounded by `longest outstanding timeout / tolerance` whatever the
//! request rate. Timeouts too long to place in a window get their own timer.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::validation::validate_provider;
use crate::config::ProviderConfig;
use crate::error::SignalError;
use crate::observability::metrics;
use crate::signal::{CancellationSignal, CancellationSource, MonotonicClock, TimerFactory};
use crate::timeout::{BucketDeadline, DirectTimeoutProvider, TimeoutSignalProvider};

/// Default coalescing window.
pub const DEFAULT_TOLERANCE_MS: u64 = 20;

/// Shares one timer between all requests landing in the same bucket.
pub struct CoalescingTimeoutProvider {
    tolerance_ms: u64,
    clock: MonotonicClock,
    timers: TimerFactory,
    fallback: DirectTimeoutProvider,
    buckets: Arc<DashMap<i64, CancellationSignal>>,
}

impl CoalescingTimeoutProvider {
    /// Create a provider with the given window width.
    ///
    /// Fails when the tolerance is zero, when the monotonic clock cannot be
    /// verified as fine-grained, or outside a tokio runtime.
    pub fn new(tolerance_ms: u64) -> Result<Self, SignalError> {
        if tolerance_ms == 0 {
            return Err(SignalError::InvalidConfiguration(
                "tolerance_ms must be positive".into(),
            ));
        }

        let provider = Self {
            tolerance_ms,
            clock: MonotonicClock::verified()?,
            timers: TimerFactory::current("coalescing")?,
            fallback: DirectTimeoutProvider::with_timers(TimerFactory::current("coalescing_fallback")?),
            buckets: Arc::new(DashMap::new()),
        };

        tracing::info!(tolerance_ms, "Coalescing timeout provider ready");
        Ok(provider)
    }

    /// Validate the provider section and build from it.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, SignalError> {
        validate_provider(config)?;
        Self::new(config.tolerance_ms)
    }

    pub fn tolerance_ms(&self) -> u64 {
        self.tolerance_ms
    }

    /// Windows with a pending timer.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn arm_bucket(&self, deadline: BucketDeadline) -> (CancellationSignal, Option<CancellationSource>) {
        match self.buckets.entry(deadline.bucket) {
            Entry::Occupied(entry) => (entry.get().clone(), None),
            Entry::Vacant(entry) => {
                let source = self.timers.arm(deadline.fire_after);
                let signal = source.signal();
                entry.insert(signal.clone());
                (signal, Some(source))
            }
        }
    }

    fn install_cleanup(&self, bucket: i64, source: CancellationSource, signal: &CancellationSignal) {
        let buckets = Arc::downgrade(&self.buckets);
        let id = signal.source_id();

        // Registered after the shard lock is released: if the timer already
        // fired, the callback runs inline and takes the lock itself.
        signal.register(move || {
            if let Some(buckets) = buckets.upgrade() {
                buckets.remove_if(&bucket, |_, current| current.source_id() == id);
                metrics::record_bucket_count(buckets.len());
            }
            source.dispose();
        });
    }
}

impl TimeoutSignalProvider for CoalescingTimeoutProvider {
    fn get_signal(&self, timeout: Duration) -> CancellationSignal {
        if timeout.is_zero() {
            return CancellationSignal::already_cancelled();
        }

        let Some(deadline) =
            BucketDeadline::compute(self.clock.now_ms(), timeout, self.tolerance_ms as f64)
        else {
            tracing::debug!(timeout_secs = timeout.as_secs(), "Timeout beyond any window, not coalesced");
            return self.fallback.get_signal(timeout);
        };

        let existing = self.buckets.get(&deadline.bucket).map(|r| r.value().clone());
        if let Some(signal) = existing {
            metrics::record_coalesced_hit();
            return signal;
        }

        let (signal, created) = self.arm_bucket(deadline);
        match created {
            Some(source) => {
                tracing::trace!(
                    bucket = deadline.bucket,
                    fire_after_ms = deadline.fire_after.as_millis() as u64,
                    "Armed coalesced timer"
                );
                metrics::record_bucket_count(self.buckets.len());
                self.install_cleanup(deadline.bucket, source, &signal);
            }
            None => metrics::record_coalesced_hit(),
        }
        signal
    }

    fn live_timers(&self) -> usize {
        self.timers.live_timers() + self.fallback.live_timers()
    }

    fn name(&self) -> &'static str {
        "coalescing"
    }
}

impl std::fmt::Debug for CoalescingTimeoutProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingTimeoutProvider")
            .field("tolerance_ms", &self.tolerance_ms)
            .field("buckets", &self.bucket_count())
            .field("live_timers", &self.live_timers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_same_window_shares_timer() {
        let provider = CoalescingTimeoutProvider::new(20).unwrap();

        let a = provider.get_signal(Duration::from_millis(1_000));
        tokio::time::advance(Duration::from_millis(5)).await;
        let b = provider.get_signal(Duration::from_millis(1_000));

        assert!(a.same_source(&b));
        assert_eq!(provider.bucket_count(), 1);
        assert_eq!(provider.live_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_within_tolerance() {
        let provider = CoalescingTimeoutProvider::new(20).unwrap();
        let start = Instant::now();

        let signal = provider.get_signal(Duration::from_millis(1_000));
        signal.cancelled().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1_000), "fired early: {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(1_021), "fired late: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_removed_when_fired() {
        let provider = CoalescingTimeoutProvider::new(20).unwrap();

        let signal = provider.get_signal(Duration::from_millis(100));
        assert_eq!(provider.bucket_count(), 1);

        signal.cancelled().await;
        assert_eq!(provider.bucket_count(), 0);
        assert_eq!(provider.live_timers(), 0);

        let next = provider.get_signal(Duration::from_millis(100));
        assert!(!next.same_source(&signal));
        assert!(!next.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_windows_do_not_share() {
        let provider = CoalescingTimeoutProvider::new(20).unwrap();
        let a = provider.get_signal(Duration::from_millis(100));
        let b = provider.get_signal(Duration::from_millis(200));

        assert!(!a.same_source(&b));
        assert_eq!(provider.bucket_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_bypasses_map() {
        let provider = CoalescingTimeoutProvider::new(20).unwrap();
        assert!(provider.get_signal(Duration::ZERO).is_cancelled());
        assert_eq!(provider.bucket_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_never_fires_early() {
        let provider = CoalescingTimeoutProvider::new(20).unwrap();

        let signal = provider.get_signal(Duration::MAX);
        tokio::time::sleep(Duration::from_secs(3_600)).await;

        assert!(!signal.is_cancelled());
        assert_eq!(provider.bucket_count(), 0);
        assert_eq!(provider.live_timers(), 1);

        let centuries = provider.get_signal(Duration::from_secs(600 * 365 * 24 * 3_600));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!centuries.is_cancelled());
        assert_eq!(provider.live_timers(), 2);
    }

    #[tokio::test]
    async fn test_from_config_validates_provider_section() {
        let config = ProviderConfig {
            tolerance_ms: 0,
            max_duration_ms: 5_000,
        };
        let err = CoalescingTimeoutProvider::from_config(&config).unwrap_err();
        match err {
            SignalError::InvalidConfiguration(msg) => assert!(msg.contains("provider.tolerance_ms")),
            other => panic!("unexpected error: {other}"),
        }

        let provider = CoalescingTimeoutProvider::from_config(&ProviderConfig::default()).unwrap();
        assert_eq!(provider.tolerance_ms(), DEFAULT_TOLERANCE_MS);
    }

    #[tokio::test]
    async fn test_rejects_zero_tolerance() {
        let err = CoalescingTimeoutProvider::new(0).unwrap_err();
        assert!(matches!(err, SignalError::InvalidConfiguration(_)));
    }
}
