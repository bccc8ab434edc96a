//! Timeout signal providers.
//!
//! # Data Flow
//! ```text
//! get_signal(d)
//!     → d == 0: already-cancelled signal
//!     → direct.rs:     one timer per request
//!     → coalescing.rs: bucket = floor((now + d) / tolerance)
//!                      DashMap entry → shared timer for the bucket
//!     → pooled.rs:     slot = bucket mod ring_size
//!                      reuse armed slot, or rearm under the slot lock
//! ```
//!
//! # Design Decisions
//! - Deadlines are rounded up to the bucket's right edge: a signal may fire
//!   up to one tolerance late but never before the requested deadline
//! - No lock spans more than one bucket or slot

use std::time::Duration;

use crate::signal::CancellationSignal;

pub mod coalescing;
pub mod direct;
pub mod pooled;

pub use coalescing::CoalescingTimeoutProvider;
pub use direct::DirectTimeoutProvider;
pub use pooled::PooledTimeoutProvider;

/// Hands out signals that fire once a duration has elapsed.
pub trait TimeoutSignalProvider: Send + Sync {
    /// Get a signal that fires no earlier than `timeout` from now.
    fn get_signal(&self, timeout: Duration) -> CancellationSignal;

    /// Underlying timers currently armed by this provider.
    fn live_timers(&self) -> usize;

    /// Short provider name for logs and metrics.
    fn name(&self) -> &'static str;
}

/// A request's deadline quantized to a tolerance window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BucketDeadline {
    /// `floor(deadline_ms / tolerance_ms)`.
    pub bucket: i64,
    /// Time from now until the bucket's right edge.
    pub fire_after: Duration,
}

impl BucketDeadline {
    /// `None` when the bucket or the wait does not fit the integer types;
    /// callers hand such timeouts to an unshared timer.
    pub(crate) fn compute(now_ms: f64, timeout: Duration, tolerance_ms: f64) -> Option<Self> {
        let deadline_ms = now_ms + timeout.as_secs_f64() * 1_000.0;
        let bucket = (deadline_ms / tolerance_ms).floor();
        // `as` saturates; the next edge must stay representable.
        if !bucket.is_finite() || bucket >= i64::MAX as f64 {
            return None;
        }
        let bucket = bucket as i64;
        let ceiled_ms = (bucket + 1) as f64 * tolerance_ms;

        let fire_after_ns = ((ceiled_ms - now_ms).max(0.0) * 1_000_000.0).ceil();
        if fire_after_ns >= u64::MAX as f64 {
            return None;
        }

        Some(Self {
            bucket,
            fire_after: Duration::from_nanos(fire_after_ns as u64),
        })
    }
}
