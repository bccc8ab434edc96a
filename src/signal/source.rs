//! Cancellation source, signal and registration handles.
//!
//! # State
//! ```text
//! flags: 0b00 live
//!        0b01 cancelled            (callbacks drained and invoked)
//!        0b10 disposed             (callbacks drained and dropped)
//!        0b11 cancelled, disposed
//! ```
//! `cancel()` only acts from `0b00`; `dispose()` only acts the first time it
//! sets bit 1. A cancel that loses against dispose is a no-op.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::Notify;

use crate::signal::timer::TimerHandle;

const CANCELLED: u8 = 0b01;
const DISPOSED: u8 = 0b10;

type Callback = Box<dyn FnOnce() + Send + 'static>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: HashMap<u64, Callback>,
}

/// Shared state behind a source and all of its signals.
pub(crate) struct CancelState {
    flags: AtomicU8,
    registry: Mutex<Registry>,
    timer: Mutex<Option<TimerHandle>>,
    notify: Notify,
}

impl CancelState {
    fn new() -> Self {
        Self {
            flags: AtomicU8::new(0),
            registry: Mutex::new(Registry::default()),
            timer: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.flags.load(Ordering::Acquire) & CANCELLED != 0
    }

    fn is_disposed(&self) -> bool {
        self.flags.load(Ordering::Acquire) & DISPOSED != 0
    }

    pub(crate) fn cancel(&self) {
        if self
            .flags
            .compare_exchange(0, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.release_timer();
        let callbacks = std::mem::take(&mut lock(&self.registry).callbacks);
        for callback in callbacks.into_values() {
            callback();
        }

        // Parked waiters resume after the callbacks have run.
        self.notify.notify_waiters();
    }

    fn dispose(&self) {
        let prev = self.flags.fetch_or(DISPOSED, Ordering::AcqRel);
        if prev & DISPOSED != 0 {
            return;
        }

        self.release_timer();
        // Dropped outside the lock; callbacks may own other signals.
        let callbacks = std::mem::take(&mut lock(&self.registry).callbacks);
        drop(callbacks);
    }

    fn release_timer(&self) {
        let timer = lock(&self.timer).take();
        drop(timer);
    }

    pub(crate) fn attach_timer(&self, timer: TimerHandle) {
        let mut slot = lock(&self.timer);
        if self.flags.load(Ordering::Acquire) != 0 {
            // Fired or disposed before the handle arrived.
            drop(slot);
            drop(timer);
            return;
        }
        *slot = Some(timer);
    }

    fn register(self: &Arc<Self>, callback: Callback) -> Registration {
        let mut registry = lock(&self.registry);
        let flags = self.flags.load(Ordering::Acquire);

        if flags & DISPOSED != 0 {
            return Registration::inert();
        }
        if flags & CANCELLED != 0 {
            drop(registry);
            callback();
            return Registration::inert();
        }

        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.insert(id, callback);

        Registration {
            state: Arc::downgrade(self),
            id: Some(id),
        }
    }

    fn unregister(&self, id: u64) -> bool {
        lock(&self.registry).callbacks.remove(&id).is_some()
    }

    fn registered_callbacks(&self) -> usize {
        lock(&self.registry).callbacks.len()
    }
}

/// The writable owner of a cancellation signal.
///
/// A source is not cancelled by being dropped: signals handed out keep the
/// shared state alive, and a timer attached to it keeps running until it
/// fires or the source is disposed.
pub struct CancellationSource {
    state: Arc<CancelState>,
}

impl CancellationSource {
    /// Create a live, cancellable source.
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancelState::new()),
        }
    }

    /// Get a signal observing this source.
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            state: Some(self.state.clone()),
        }
    }

    /// Cancel the signal and run every registered callback once.
    ///
    /// No-op after a previous `cancel()` or `dispose()`.
    pub fn cancel(&self) {
        self.state.cancel();
    }

    /// Release the timer and every registration without invoking them.
    pub fn dispose(&self) {
        self.state.dispose();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    pub(crate) fn downgrade(&self) -> Weak<CancelState> {
        Arc::downgrade(&self.state)
    }

    pub(crate) fn attach_timer(&self, timer: TimerHandle) {
        self.state.attach_timer(timer);
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSource")
            .field("cancelled", &self.state.is_cancelled())
            .field("disposed", &self.state.is_disposed())
            .finish()
    }
}

/// Read-only view of a one-shot cancellation event.
///
/// Cheap to clone; all clones observe the same state.
#[derive(Clone)]
pub struct CancellationSignal {
    state: Option<Arc<CancelState>>,
}

impl CancellationSignal {
    /// A signal that can never be cancelled.
    pub fn none() -> Self {
        Self { state: None }
    }

    /// A signal that is cancelled from the start.
    pub fn already_cancelled() -> Self {
        let state = CancelState::new();
        state.flags.store(CANCELLED, Ordering::Release);
        Self {
            state: Some(Arc::new(state)),
        }
    }

    pub fn is_cancellable(&self) -> bool {
        self.state.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.is_cancelled())
    }

    /// Attach a callback to run when the signal is cancelled.
    ///
    /// If the signal is already cancelled the callback runs immediately on
    /// the calling thread. On a disposed or never-cancellable signal the
    /// callback is dropped without running. Dropping the returned
    /// [`Registration`] leaves the callback attached.
    pub fn register<F>(&self, callback: F) -> Registration
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.state {
            Some(state) => state.register(Box::new(callback)),
            None => Registration::inert(),
        }
    }

    /// Number of callbacks currently waiting on this signal.
    pub fn registered_callbacks(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.registered_callbacks())
    }

    /// Wait until the signal is cancelled.
    ///
    /// Never completes for a signal that cannot be cancelled or whose source
    /// was disposed without cancelling.
    pub async fn cancelled(&self) {
        let Some(state) = &self.state else {
            return std::future::pending().await;
        };

        loop {
            let notified = state.notify.notified();
            if state.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Whether both signals observe the same source.
    pub fn same_source(&self, other: &CancellationSignal) -> bool {
        match (&self.state, &other.state) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Stable identity of the underlying source, `None` if not cancellable.
    pub(crate) fn source_id(&self) -> Option<usize> {
        self.state.as_ref().map(|s| Arc::as_ptr(s) as usize)
    }
}

impl fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("cancellable", &self.is_cancellable())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Handle to a registered callback.
#[derive(Debug)]
pub struct Registration {
    state: Weak<CancelState>,
    id: Option<u64>,
}

impl Registration {
    fn inert() -> Self {
        Self {
            state: Weak::new(),
            id: None,
        }
    }

    /// Remove the callback if it has not run yet.
    ///
    /// Returns `true` only for the call that actually removed it.
    pub fn unregister(&self) -> bool {
        match (self.id, self.state.upgrade()) {
            (Some(id), Some(state)) => state.unregister(id),
            _ => false,
        }
    }

    /// Whether the registration was attached to a live signal.
    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }
}
