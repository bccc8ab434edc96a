//! Pooled timeout provider.
//!
//! # How it works
//! ```text
//! max_duration = 100ms, tolerance = 20ms → ring of 5 slots, one per window:
//!
//!   t=0    [ 20 | 40 | 60 | 80 | 100 ]   request 35ms → bucket 1 → slot 1 (fires at 40)
//!   t=40   [ -- | -- | 20 | 40 | 60  ]   slots 0 and 1 have expired
//!   t=40   request 35ms → bucket 3 → slot 3, still armed for 80 → reused
//!   t=40   request 65ms → bucket 5 → slot 0, expired → rearmed for 120
//! ```
//! The slot index is `bucket mod ring_size`, so it advances with the clock
//! and an index only comes back around once its previous window has passed.
//! Live pooled timers are bounded by the ring length.
//!
//! # Design Decisions
//! - Reads are lock-free (`ArcSwap` snapshot of the armed slot)
//! - Rearming takes the slot's own lock and re-checks expiry
//! - Timeouts of `max_duration - tolerance` or more go to a direct provider

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::config::validation::validate_provider;
use crate::config::ProviderConfig;
use crate::error::SignalError;
use crate::observability::metrics;
use crate::signal::{CancellationSignal, CancellationSource, MonotonicClock, TimerFactory};
use crate::timeout::{BucketDeadline, DirectTimeoutProvider, TimeoutSignalProvider};

/// Default longest pooled duration.
pub const DEFAULT_MAX_DURATION_MS: u64 = 5_000;

/// What a slot is currently armed with.
struct ArmedSlot {
    bucket: i64,
    armed_since_ms: f64,
    duration_ms: f64,
    source: CancellationSource,
    signal: CancellationSignal,
}

impl ArmedSlot {
    fn expired() -> Self {
        let source = CancellationSource::new();
        source.cancel();
        Self {
            bucket: i64::MIN,
            armed_since_ms: 0.0,
            duration_ms: 0.0,
            signal: source.signal(),
            source,
        }
    }

    fn is_timeout_elapsed(&self, now_ms: f64) -> bool {
        now_ms - self.armed_since_ms >= self.duration_ms
    }
}

struct PooledSlot {
    current: ArcSwap<ArmedSlot>,
    rearm: Mutex<()>,
}

impl PooledSlot {
    fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ArmedSlot::expired()),
            rearm: Mutex::new(()),
        }
    }
}

/// Serves timeouts from a fixed ring of reusable timers.
pub struct PooledTimeoutProvider {
    max_duration_ms: u64,
    tolerance_ms: u64,
    clock: MonotonicClock,
    timers: TimerFactory,
    fallback: DirectTimeoutProvider,
    slots: Box<[PooledSlot]>,
}

impl PooledTimeoutProvider {
    /// Create a provider pooling timeouts up to `max_duration_ms`.
    ///
    /// `max_duration_ms` is rounded up to a multiple of `tolerance_ms`; the
    /// ring has one slot per tolerance window in that range.
    pub fn new(max_duration_ms: u64, tolerance_ms: u64) -> Result<Self, SignalError> {
        if tolerance_ms == 0 || max_duration_ms == 0 {
            return Err(SignalError::InvalidConfiguration(format!(
                "max_duration_ms ({max_duration_ms}) and tolerance_ms ({tolerance_ms}) must be positive"
            )));
        }

        let max_duration_ms = max_duration_ms.div_ceil(tolerance_ms) * tolerance_ms;
        let ring_size = (max_duration_ms / tolerance_ms) as usize;
        if ring_size < 2 {
            return Err(SignalError::InvalidConfiguration(format!(
                "max_duration_ms ({max_duration_ms}) must span at least two tolerance windows"
            )));
        }

        let clock = MonotonicClock::verified()?;
        let timers = TimerFactory::current("pooled")?;
        let fallback = DirectTimeoutProvider::with_timers(TimerFactory::current("pooled_fallback")?);
        let slots = (0..ring_size).map(|_| PooledSlot::new()).collect();

        tracing::info!(max_duration_ms, tolerance_ms, ring_size, "Pooled timeout provider ready");

        Ok(Self {
            max_duration_ms,
            tolerance_ms,
            clock,
            timers,
            fallback,
            slots,
        })
    }

    /// Validate the provider section and build from it.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, SignalError> {
        validate_provider(config)?;
        Self::new(config.max_duration_ms, config.tolerance_ms)
    }

    pub fn ring_size(&self) -> usize {
        self.slots.len()
    }

    /// Rounded-up pooled range.
    pub fn max_duration_ms(&self) -> u64 {
        self.max_duration_ms
    }

    pub fn tolerance_ms(&self) -> u64 {
        self.tolerance_ms
    }

    /// Timers owned by the ring, excluding unpooled fallbacks.
    pub fn live_pooled_timers(&self) -> usize {
        self.timers.live_timers()
    }

    /// Slots whose window has not elapsed yet.
    pub fn armed_slots(&self) -> usize {
        let now_ms = self.clock.now_ms();
        self.slots
            .iter()
            .filter(|slot| !slot.current.load().is_timeout_elapsed(now_ms))
            .count()
    }

    fn unpooled(&self, timeout: Duration, reason: &'static str) -> CancellationSignal {
        metrics::record_pool_fallback(reason);
        self.fallback.get_signal(timeout)
    }

    fn rearm(
        &self,
        index: usize,
        now_ms: f64,
        deadline: BucketDeadline,
        timeout: Duration,
    ) -> CancellationSignal {
        let slot = &self.slots[index];
        let _guard = slot.rearm.lock().unwrap_or_else(PoisonError::into_inner);

        let current = slot.current.load();
        if !current.is_timeout_elapsed(now_ms) {
            // Rearmed by another caller while we waited for the lock.
            if current.bucket == deadline.bucket {
                return current.signal.clone();
            }
            return self.unpooled(timeout, "slot_busy");
        }

        // Cancels holders if the old timer is running late; their deadline
        // has already passed.
        current.source.cancel();
        current.source.dispose();

        let source = self.timers.arm(deadline.fire_after);
        let next = Arc::new(ArmedSlot {
            bucket: deadline.bucket,
            armed_since_ms: now_ms,
            duration_ms: deadline.fire_after.as_secs_f64() * 1_000.0,
            signal: source.signal(),
            source,
        });
        slot.current.store(next.clone());

        metrics::record_pool_rearm();
        tracing::trace!(
            slot = index,
            bucket = deadline.bucket,
            fire_after_ms = deadline.fire_after.as_millis() as u64,
            "Rearmed pooled slot"
        );

        next.signal.clone()
    }
}

impl TimeoutSignalProvider for PooledTimeoutProvider {
    fn get_signal(&self, timeout: Duration) -> CancellationSignal {
        let timeout_ms = timeout.as_secs_f64() * 1_000.0;
        if timeout_ms >= (self.max_duration_ms - self.tolerance_ms) as f64 {
            return self.unpooled(timeout, "out_of_range");
        }
        if timeout.is_zero() {
            return CancellationSignal::already_cancelled();
        }

        let now_ms = self.clock.now_ms();
        let Some(deadline) = BucketDeadline::compute(now_ms, timeout, self.tolerance_ms as f64) else {
            return self.unpooled(timeout, "out_of_range");
        };
        let index = deadline.bucket.rem_euclid(self.slots.len() as i64) as usize;

        let current = self.slots[index].current.load();
        if current.is_timeout_elapsed(now_ms) {
            drop(current);
            return self.rearm(index, now_ms, deadline, timeout);
        }

        if current.bucket == deadline.bucket {
            return current.signal.clone();
        }

        // A live slot one revolution away; unreachable while timeouts stay
        // below max_duration - tolerance, kept so a slot never fires early.
        self.unpooled(timeout, "slot_busy")
    }

    fn live_timers(&self) -> usize {
        self.timers.live_timers() + self.fallback.live_timers()
    }

    fn name(&self) -> &'static str {
        "pooled"
    }
}

impl std::fmt::Debug for PooledTimeoutProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledTimeoutProvider")
            .field("max_duration_ms", &self.max_duration_ms)
            .field("tolerance_ms", &self.tolerance_ms)
            .field("ring_size", &self.ring_size())
            .field("live_timers", &self.live_timers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_ring_size_rounds_up() {
        let provider = PooledTimeoutProvider::new(5_010, 20).unwrap();
        assert_eq!(provider.max_duration_ms(), 5_020);
        assert_eq!(provider.ring_size(), 251);

        let provider = PooledTimeoutProvider::new(5_000, 20).unwrap();
        assert_eq!(provider.ring_size(), 250);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reuses_armed_slot() {
        let provider = PooledTimeoutProvider::new(200, 20).unwrap();

        let a = provider.get_signal(Duration::from_millis(100));
        tokio::time::advance(Duration::from_millis(5)).await;
        let b = provider.get_signal(Duration::from_millis(100));

        assert!(a.same_source(&b));
        assert_eq!(provider.live_pooled_timers(), 1);
        assert_eq!(provider.armed_slots(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_within_tolerance() {
        let provider = PooledTimeoutProvider::new(200, 20).unwrap();
        let start = Instant::now();

        provider.get_signal(Duration::from_millis(90)).cancelled().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(90));
        assert!(elapsed <= Duration::from_millis(111));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearms_expired_slot() {
        let provider = PooledTimeoutProvider::new(200, 20).unwrap();

        // bucket 5 → slot 5
        let first = provider.get_signal(Duration::from_millis(100));
        first.cancelled().await;
        assert_eq!(provider.live_pooled_timers(), 0);

        // t=200: deadline 300 → bucket 15 → slot 5 again
        tokio::time::advance(Duration::from_millis(80)).await;
        let second = provider.get_signal(Duration::from_millis(100));

        assert!(!second.same_source(&first));
        assert!(!second.is_cancelled());
        assert_eq!(provider.live_pooled_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_timeouts_fall_back() {
        let provider = PooledTimeoutProvider::new(200, 20).unwrap();

        let a = provider.get_signal(Duration::from_millis(180));
        let b = provider.get_signal(Duration::from_millis(180));

        assert!(!a.same_source(&b));
        assert_eq!(provider.live_pooled_timers(), 0);
        assert_eq!(provider.live_timers(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_is_already_cancelled() {
        let provider = PooledTimeoutProvider::new(200, 20).unwrap();
        assert!(provider.get_signal(Duration::ZERO).is_cancelled());
        assert_eq!(provider.live_timers(), 0);
    }

    #[tokio::test]
    async fn test_from_config_validates_provider_section() {
        let config = ProviderConfig {
            tolerance_ms: 100,
            max_duration_ms: 100,
        };
        let err = PooledTimeoutProvider::from_config(&config).unwrap_err();
        match err {
            SignalError::InvalidConfiguration(msg) => assert!(msg.contains("must exceed")),
            other => panic!("unexpected error: {other}"),
        }

        let provider = PooledTimeoutProvider::from_config(&ProviderConfig::default()).unwrap();
        assert_eq!(provider.ring_size(), 250);
    }

    #[tokio::test]
    async fn test_rejects_bad_configuration() {
        assert!(matches!(
            PooledTimeoutProvider::new(0, 20),
            Err(SignalError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            PooledTimeoutProvider::new(200, 0),
            Err(SignalError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            PooledTimeoutProvider::new(20, 20),
            Err(SignalError::InvalidConfiguration(_))
        ));
    }
}
