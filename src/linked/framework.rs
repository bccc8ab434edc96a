//! Baseline linked source.
//!
//! Registers a strong reference to the linked source on both inputs and only
//! takes the registrations off in `dispose()`. Firing does not release them,
//! and there is no `Drop` cleanup: a source that is never disposed stays
//! attached to its inputs for as long as they live.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::linked::{LinkedSignalProvider, LinkedSource};
use crate::observability::metrics;
use crate::signal::{CancellationSignal, CancellationSource, Registration};

/// Linked source whose registrations live until `dispose()`.
pub struct FrameworkLinkedSource {
    source: Arc<CancellationSource>,
    registrations: Mutex<Option<Vec<Registration>>>,
    releases: AtomicUsize,
}

impl FrameworkLinkedSource {
    pub fn new(a: &CancellationSignal, b: &CancellationSignal) -> Self {
        let source = Arc::new(CancellationSource::new());

        let registrations: Vec<Registration> = [a, b]
            .into_iter()
            .filter(|input| input.is_cancellable())
            .map(|input| {
                let source = source.clone();
                input.register(move || source.cancel())
            })
            .collect();

        Self {
            source,
            registrations: Mutex::new(Some(registrations)),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::Acquire)
    }
}

impl LinkedSource for FrameworkLinkedSource {
    fn signal(&self) -> CancellationSignal {
        self.source.signal()
    }

    fn cancel(&self) {
        self.source.cancel();
    }

    fn dispose(&self) {
        let taken = self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(registrations) = taken {
            for registration in &registrations {
                registration.unregister();
            }
            self.releases.fetch_add(1, Ordering::AcqRel);
            metrics::record_linked_release("dispose");
            self.source.dispose();
        }
    }
}

impl std::fmt::Debug for FrameworkLinkedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameworkLinkedSource")
            .field("source", &self.source)
            .field("releases", &self.releases())
            .finish()
    }
}

/// Provider for [`FrameworkLinkedSource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameworkLinkedProvider;

impl LinkedSignalProvider for FrameworkLinkedProvider {
    type Source = FrameworkLinkedSource;

    fn get_linked_source(&self, a: &CancellationSignal, b: &CancellationSignal) -> Self::Source {
        FrameworkLinkedSource::new(a, b)
    }

    fn name(&self) -> &'static str {
        "framework"
    }
}
