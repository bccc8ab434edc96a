//! One timer per request.

use std::time::Duration;

use crate::error::SignalError;
use crate::signal::{CancellationSignal, TimerFactory};
use crate::timeout::TimeoutSignalProvider;

/// Baseline provider: every request arms its own timer.
#[derive(Debug, Clone)]
pub struct DirectTimeoutProvider {
    timers: TimerFactory,
}

impl DirectTimeoutProvider {
    pub fn new() -> Result<Self, SignalError> {
        Ok(Self::with_timers(TimerFactory::current("direct")?))
    }

    pub fn with_timers(timers: TimerFactory) -> Self {
        Self { timers }
    }
}

impl TimeoutSignalProvider for DirectTimeoutProvider {
    fn get_signal(&self, timeout: Duration) -> CancellationSignal {
        if timeout.is_zero() {
            return CancellationSignal::already_cancelled();
        }
        self.timers.arm(timeout).signal()
    }

    fn live_timers(&self) -> usize {
        self.timers.live_timers()
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}
