//! Error types for provider construction.
//!
//! Cancellation itself is never an error: it is observed through
//! [`CancellationSignal::is_cancelled`](crate::signal::CancellationSignal::is_cancelled).
//! Only construction can fail, and those failures are fatal.

use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors raised while constructing a signal provider.
#[derive(Debug, Error)]
pub enum SignalError {
    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The monotonic clock is too coarse for the configured tolerance.
    #[error("Monotonic clock resolution {observed_ns}ns exceeds the {limit_ns}ns limit")]
    ClockResolution { observed_ns: u64, limit_ns: u64 },

    /// The monotonic clock never advanced while probing its resolution.
    #[error("Monotonic clock did not advance after {0} samples")]
    ClockStalled(u32),

    /// Providers arm tokio timers and must be built inside a runtime.
    #[error("No tokio runtime available: {0}")]
    RuntimeUnavailable(String),
}

impl SignalError {
    /// Whether this error stems from configuration or clock verification.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, SignalError::RuntimeUnavailable(_))
    }
}

impl From<Vec<ValidationError>> for SignalError {
    fn from(errors: Vec<ValidationError>) -> Self {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        SignalError::InvalidConfiguration(joined)
    }
}
