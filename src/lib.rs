//! Cancellation signal coalescing and pooling.
//!
//! Cheap timeout signals for high-churn workloads: many requests with nearby
//! deadlines share one underlying timer, and linked signals release their
//! upstream registrations exactly once however fire and dispose race.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod linked;
pub mod observability;
pub mod signal;
pub mod soak;
pub mod timeout;

pub use config::schema::{CoalesceConfig, ProviderConfig};
pub use error::SignalError;
pub use linked::{AtomicLinkedProvider, FrameworkLinkedProvider, LinkedSignalProvider, LinkedSource};
pub use signal::{CancellationSignal, CancellationSource, Registration};
pub use timeout::{
    CoalescingTimeoutProvider, DirectTimeoutProvider, PooledTimeoutProvider, TimeoutSignalProvider,
};
