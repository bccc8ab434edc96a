//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build providers → Arm root signal → Run soak
//!
//! Shutdown:
//!     Root timer fires or SIGINT (signals.rs) → root cancelled
//!     → linked signals fire → workers dispose and exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - One root signal is the only shutdown path

pub mod signals;
