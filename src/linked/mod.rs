//! Linked cancellation sources.
//!
//! # Data Flow
//! ```text
//! input A ──register(on_fire)──┐
//!                              ├──▶ linked source ──signal()──▶ caller
//! input B ──register(on_fire)──┘          │
//!                                         └── dispose() by the caller
//! ```
//!
//! The inputs are usually long-lived (a process-wide stop signal) while the
//! linked source lives for one unit of work. Every registration left on an
//! input pins a callback for the input's whole lifetime, so each linked
//! source must take its registrations off again on every exit path.
//!
//! # Variants
//! - `atomic.rs`: two-bit atomic state; releases on first fire or on dispose,
//!   whichever comes first, exactly once
//! - `framework.rs`: baseline; registrations are only released on dispose

use crate::signal::CancellationSignal;

pub mod atomic;
pub mod framework;

pub use atomic::{AtomicLinkedProvider, AtomicLinkedSource};
pub use framework::{FrameworkLinkedProvider, FrameworkLinkedSource};

/// A derived source that fires when either input fires.
pub trait LinkedSource: Send + Sync {
    fn signal(&self) -> CancellationSignal;

    /// Cancel the linked signal without touching the inputs.
    fn cancel(&self);

    /// Release the input registrations and the linked signal. Idempotent.
    fn dispose(&self);

    fn is_cancelled(&self) -> bool {
        self.signal().is_cancelled()
    }
}

/// Builds linked sources from two inputs.
pub trait LinkedSignalProvider: Send + Sync {
    type Source: LinkedSource + 'static;

    fn get_linked_source(&self, a: &CancellationSignal, b: &CancellationSignal) -> Self::Source;

    fn name(&self) -> &'static str;
}
