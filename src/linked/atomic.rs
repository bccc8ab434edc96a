//! Linked source with atomic fire/dispose arbitration.
//!
//! # States
//! ```text
//! 0b00 ── on_fire ──▶ 0b01  cancel linked signal, release registrations
//!   │                   │
//!   │                   └── dispose ──▶ 0b11  release linked signal only
//!   └── dispose ──▶ 0b10  release registrations and linked signal
//!                     └── on_fire ──▶ 0b11  no-op
//! ```
//! Transitions are `fetch_or` on one byte; the caller that observes the
//! relevant bit clear in the previous value is the only one that acts.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::linked::{LinkedSignalProvider, LinkedSource};
use crate::observability::metrics;
use crate::signal::{CancellationSignal, CancellationSource, Registration};

const CANCEL_REQUESTED: u8 = 0b01;
const DISPOSED: u8 = 0b10;

struct LinkCore {
    state: AtomicU8,
    source: CancellationSource,
    registrations: Mutex<Option<Vec<Registration>>>,
    releases: AtomicUsize,
}

impl LinkCore {
    fn on_fire(&self) {
        let prev = self.state.fetch_or(CANCEL_REQUESTED, Ordering::AcqRel);
        if prev & (CANCEL_REQUESTED | DISPOSED) != 0 {
            return;
        }

        self.source.cancel();
        self.release_registrations("fire");
    }

    fn dispose(&self) {
        let prev = self.state.fetch_or(DISPOSED, Ordering::AcqRel);
        if prev & DISPOSED != 0 {
            return;
        }

        self.release_registrations("dispose");
        self.source.dispose();
    }

    fn release_registrations(&self, path: &'static str) {
        let taken = self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        // None while construction is still registering; it releases itself.
        if let Some(registrations) = taken {
            for registration in &registrations {
                registration.unregister();
            }
            self.releases.fetch_add(1, Ordering::AcqRel);
            metrics::record_linked_release(path);
        }
    }
}

/// Linked source that takes its input registrations off exactly once.
pub struct AtomicLinkedSource {
    core: Arc<LinkCore>,
}

impl AtomicLinkedSource {
    pub fn new(a: &CancellationSignal, b: &CancellationSignal) -> Self {
        let core = Arc::new(LinkCore {
            state: AtomicU8::new(0),
            source: CancellationSource::new(),
            registrations: Mutex::new(None),
            releases: AtomicUsize::new(0),
        });

        let registrations: Vec<Registration> = [a, b]
            .into_iter()
            .filter(|input| input.is_cancellable())
            .map(|input| {
                let core = Arc::downgrade(&core);
                input.register(move || {
                    if let Some(core) = core.upgrade() {
                        core.on_fire();
                    }
                })
            })
            .collect();

        *core
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(registrations);

        // An input that fired during registration found nothing to release.
        if core.state.load(Ordering::Acquire) & CANCEL_REQUESTED != 0 {
            core.release_registrations("fire");
        }

        Self { core }
    }

    /// How many times the input registrations were released (0 or 1).
    pub fn releases(&self) -> usize {
        self.core.releases.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.core.state.load(Ordering::Acquire) & DISPOSED != 0
    }
}

impl LinkedSource for AtomicLinkedSource {
    fn signal(&self) -> CancellationSignal {
        self.core.source.signal()
    }

    fn cancel(&self) {
        self.core.on_fire();
    }

    fn dispose(&self) {
        self.core.dispose();
    }
}

impl Drop for AtomicLinkedSource {
    fn drop(&mut self) {
        self.core.dispose();
    }
}

impl std::fmt::Debug for AtomicLinkedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicLinkedSource")
            .field("state", &self.core.state.load(Ordering::Acquire))
            .field("releases", &self.releases())
            .finish()
    }
}

/// Provider for [`AtomicLinkedSource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicLinkedProvider;

impl LinkedSignalProvider for AtomicLinkedProvider {
    type Source = AtomicLinkedSource;

    fn get_linked_source(&self, a: &CancellationSignal, b: &CancellationSignal) -> Self::Source {
        AtomicLinkedSource::new(a, b)
    }

    fn name(&self) -> &'static str {
        "atomic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_from_either_input() {
        for first in [true, false] {
            let a = CancellationSource::new();
            let b = CancellationSource::new();
            let linked = AtomicLinkedSource::new(&a.signal(), &b.signal());

            if first {
                a.cancel();
            } else {
                b.cancel();
            }

            assert!(linked.is_cancelled());
            assert_eq!(linked.releases(), 1);
            assert_eq!(a.signal().registered_callbacks(), 0);
            assert_eq!(b.signal().registered_callbacks(), 0);
        }
    }

    #[test]
    fn test_dispose_releases_registrations() {
        let a = CancellationSource::new();
        let b = CancellationSource::new();
        let linked = AtomicLinkedSource::new(&a.signal(), &b.signal());
        assert_eq!(a.signal().registered_callbacks(), 1);

        linked.dispose();
        linked.dispose();

        assert_eq!(linked.releases(), 1);
        assert_eq!(a.signal().registered_callbacks(), 0);
        assert_eq!(b.signal().registered_callbacks(), 0);

        a.cancel();
        assert!(!linked.is_cancelled());
    }

    #[test]
    fn test_cancel_after_dispose_is_noop() {
        let a = CancellationSource::new();
        let linked = AtomicLinkedSource::new(&a.signal(), &CancellationSignal::none());
        linked.dispose();
        linked.cancel();

        assert!(!linked.is_cancelled());
        assert!(linked.is_disposed());
        assert_eq!(linked.releases(), 1);
    }

    #[test]
    fn test_fire_then_dispose_releases_once() {
        let a = CancellationSource::new();
        let b = CancellationSource::new();
        let linked = AtomicLinkedSource::new(&a.signal(), &b.signal());

        a.cancel();
        b.cancel();
        linked.cancel();
        linked.dispose();

        assert!(linked.is_cancelled());
        assert_eq!(linked.releases(), 1);
    }

    #[test]
    fn test_already_cancelled_input() {
        let b = CancellationSource::new();
        let linked =
            AtomicLinkedSource::new(&CancellationSignal::already_cancelled(), &b.signal());

        assert!(linked.is_cancelled());
        assert_eq!(linked.releases(), 1);
        assert_eq!(b.signal().registered_callbacks(), 0);
    }

    #[test]
    fn test_uncancellable_inputs_register_nothing() {
        let linked = AtomicLinkedSource::new(&CancellationSignal::none(), &CancellationSignal::none());
        assert!(!linked.is_cancelled());
        assert!(linked.signal().is_cancellable());

        linked.cancel();
        assert!(linked.is_cancelled());
    }

    #[test]
    fn test_drop_disposes() {
        let a = CancellationSource::new();
        {
            let _linked = AtomicLinkedSource::new(&a.signal(), &CancellationSignal::none());
            assert_eq!(a.signal().registered_callbacks(), 1);
        }
        assert_eq!(a.signal().registered_callbacks(), 0);
    }

    #[test]
    fn test_linked_of_linked_propagates() {
        let root = CancellationSource::new();
        let outer = AtomicLinkedSource::new(&root.signal(), &CancellationSignal::none());
        let inner = AtomicLinkedSource::new(&outer.signal(), &CancellationSignal::none());

        root.cancel();
        assert!(outer.is_cancelled());
        assert!(inner.is_cancelled());
        assert_eq!(outer.signal().registered_callbacks(), 0);
    }
}
