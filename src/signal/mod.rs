//! Cancellation primitive.
//!
//! # Data Flow
//! ```text
//! CancellationSource ──signal()──▶ CancellationSignal (clone freely)
//!        │                                │
//!        │ cancel()                       │ register(cb) ─▶ Registration
//!        ▼                                ▼
//!   flags |= CANCELLED  ──────────▶ callbacks run once, waiters woken
//!
//! TimerFactory::arm(d) ─▶ CancellationSource + tokio sleep task
//!                          (task holds Weak, source owns the AbortHandle)
//! ```
//!
//! # Design Decisions
//! - One atomic flag word per source; callbacks live in a small locked map
//! - Registering on a cancelled signal runs the callback inline
//! - Disposal drops callbacks without running them and disarms the timer

pub mod clock;
pub mod source;
pub mod timer;

pub use clock::MonotonicClock;
pub use source::{CancellationSignal, CancellationSource, Registration};
pub use timer::TimerFactory;
