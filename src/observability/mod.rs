//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! signal / timeout / linked / soak produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - Structured fields (provider, bucket, slot) instead of formatted strings
//! - Metrics are cheap (atomic increments), safe on the hot path

pub mod logging;
pub mod metrics;
