//! Monotonic millisecond clock used for bucket arithmetic.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::SignalError;

/// Coarsest tick accepted from the platform's monotonic clock.
pub const RESOLUTION_LIMIT: Duration = Duration::from_millis(1);

const PROBE_SAMPLES: u32 = 1_000_000;
const PROBE_TRANSITIONS: u32 = 8;

/// Monotonic clock reporting fractional milliseconds since construction.
///
/// Reads go through `tokio::time::Instant` so a paused test runtime drives
/// bucket arithmetic and timers from the same clock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock after verifying the platform clock is fine-grained.
    pub fn verified() -> Result<Self, SignalError> {
        let observed = probe_resolution()?;
        if observed > RESOLUTION_LIMIT {
            return Err(SignalError::ClockResolution {
                observed_ns: observed.as_nanos() as u64,
                limit_ns: RESOLUTION_LIMIT.as_nanos() as u64,
            });
        }
        tracing::debug!(resolution_ns = observed.as_nanos() as u64, "Monotonic clock verified");
        Ok(Self {
            origin: Instant::now(),
        })
    }

    /// Milliseconds elapsed since the clock was created.
    pub fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1_000.0
    }
}

/// Smallest observed step of `std::time::Instant` over a few transitions.
pub fn probe_resolution() -> Result<Duration, SignalError> {
    let mut finest = Duration::MAX;
    let mut samples = 0u32;

    for _ in 0..PROBE_TRANSITIONS {
        let start = std::time::Instant::now();
        loop {
            samples += 1;
            if samples > PROBE_SAMPLES {
                return Err(SignalError::ClockStalled(PROBE_SAMPLES));
            }
            let step = std::time::Instant::now().duration_since(start);
            if !step.is_zero() {
                finest = finest.min(step);
                break;
            }
        }
    }

    Ok(finest)
}
