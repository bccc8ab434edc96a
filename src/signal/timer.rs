//! Timer-backed cancellation sources.
//!
//! Every underlying timer is a tokio task sleeping until its deadline. The
//! task only holds a weak reference to the state it cancels, and the state
//! owns the task's [`TimerHandle`]. Whichever of fire, early cancel, dispose
//! or drop of the last signal comes first releases the handle, which aborts
//! the task and decrements the factory's live count exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::error::SignalError;
use crate::observability::metrics;
use crate::signal::CancellationSource;

/// Ownership of one armed timer task.
pub(crate) struct TimerHandle {
    abort: AbortHandle,
    live: Arc<AtomicUsize>,
    provider: &'static str,
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.abort.abort();
        let remaining = self.live.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics::record_timer_released(self.provider);
        metrics::record_live_timers(self.provider, remaining);
    }
}

/// Arms cancellation sources that cancel themselves after a delay.
#[derive(Clone)]
pub struct TimerFactory {
    handle: Handle,
    live: Arc<AtomicUsize>,
    provider: &'static str,
}

impl TimerFactory {
    /// Create a factory bound to the current tokio runtime.
    pub fn current(provider: &'static str) -> Result<Self, SignalError> {
        let handle =
            Handle::try_current().map_err(|e| SignalError::RuntimeUnavailable(e.to_string()))?;
        Ok(Self::with_handle(handle, provider))
    }

    /// Create a factory that spawns timers on the given runtime.
    pub fn with_handle(handle: Handle, provider: &'static str) -> Self {
        Self {
            handle,
            live: Arc::new(AtomicUsize::new(0)),
            provider,
        }
    }

    /// Arm a new source that cancels once `after` has elapsed.
    pub fn arm(&self, after: Duration) -> CancellationSource {
        let source = CancellationSource::new();
        let target = source.downgrade();
        let provider = self.provider;

        let live = self.live.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::record_timer_armed(provider);
        metrics::record_live_timers(provider, live);

        let task = self.handle.spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(state) = target.upgrade() {
                tracing::trace!(provider, after_ms = after.as_millis() as u64, "Timer fired");
                metrics::record_timer_fired(provider);
                state.cancel();
            }
        });

        source.attach_timer(TimerHandle {
            abort: task.abort_handle(),
            live: self.live.clone(),
            provider,
        });
        source
    }

    /// Number of timers armed and not yet fired or released.
    pub fn live_timers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for TimerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerFactory")
            .field("provider", &self.provider)
            .field("live", &self.live_timers())
            .finish()
    }
}
