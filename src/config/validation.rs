//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (tolerance > 0, pooled range covers a slot)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CoalesceConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{CoalesceConfig, ProviderConfig, SoakConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be positive")]
    NotPositive { field: &'static str },

    #[error("provider.max_duration_ms ({max_duration_ms}) must exceed provider.tolerance_ms ({tolerance_ms})")]
    RangeTooSmall { max_duration_ms: u64, tolerance_ms: u64 },

    #[error("soak.fork_probability must be within [0, 1], got {0}")]
    Probability(String),

    #[error("observability.metrics_address is not a socket address: {0}")]
    MetricsAddress(String),
}

/// Check the provider settings alone.
pub fn validate_provider(provider: &ProviderConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_provider(provider, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check every section of a configuration.
pub fn validate_config(config: &CoalesceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_provider(&config.provider, &mut errors);
    check_soak(&config.soak, &mut errors);

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_provider(provider: &ProviderConfig, errors: &mut Vec<ValidationError>) {
    if provider.tolerance_ms == 0 {
        errors.push(ValidationError::NotPositive {
            field: "provider.tolerance_ms",
        });
    }
    if provider.max_duration_ms == 0 {
        errors.push(ValidationError::NotPositive {
            field: "provider.max_duration_ms",
        });
    }
    if provider.tolerance_ms > 0
        && provider.max_duration_ms > 0
        && provider.max_duration_ms <= provider.tolerance_ms
    {
        errors.push(ValidationError::RangeTooSmall {
            max_duration_ms: provider.max_duration_ms,
            tolerance_ms: provider.tolerance_ms,
        });
    }
}

fn check_soak(soak: &SoakConfig, errors: &mut Vec<ValidationError>) {
    let positive = [
        ("soak.workers", soak.workers as u64),
        ("soak.duration_secs", soak.duration_secs),
        ("soak.max_timeout_ms", soak.max_timeout_ms),
        ("soak.max_work_ms", soak.max_work_ms),
        ("soak.report_interval_secs", soak.report_interval_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::NotPositive { field });
        }
    }

    if !(0.0..=1.0).contains(&soak.fork_probability) {
        errors.push(ValidationError::Probability(soak.fork_probability.to_string()));
    }
}
