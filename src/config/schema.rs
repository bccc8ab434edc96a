//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! fall back to defaults for missing fields.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct CoalesceConfig {
    /// Signal provider settings.
    pub provider: ProviderConfig,

    /// Soak workload settings.
    pub soak: SoakConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Constructor-time settings shared by the timeout providers.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Width of one coalescing window in milliseconds.
    pub tolerance_ms: u64,

    /// Longest duration the pooled provider serves from its ring.
    pub max_duration_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: 20,
            max_duration_ms: 5_000,
        }
    }
}

/// Which timeout provider the soak driver exercises.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutProviderKind {
    Direct,
    #[default]
    Coalescing,
    Pooled,
}

/// Which linked provider the soak driver exercises.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkedProviderKind {
    #[default]
    Atomic,
    Framework,
}

/// Soak workload configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SoakConfig {
    pub timeout_provider: TimeoutProviderKind,

    pub linked_provider: LinkedProviderKind,

    /// Concurrent workers.
    pub workers: usize,

    /// Total run time in seconds.
    pub duration_secs: u64,

    /// Upper bound for random timeout requests in milliseconds.
    pub max_timeout_ms: u64,

    /// Upper bound for the simulated work delay in milliseconds.
    pub max_work_ms: u64,

    /// Probability that a unit of work forks a nested linked signal.
    pub fork_probability: f64,

    /// Maximum nesting depth of forked work.
    pub max_fork_depth: u32,

    /// Seconds between progress reports.
    pub report_interval_secs: u64,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            timeout_provider: TimeoutProviderKind::default(),
            linked_provider: LinkedProviderKind::default(),
            workers: 1_000,
            duration_secs: 20,
            max_timeout_ms: 5_000,
            max_work_ms: 1_000,
            fork_probability: 0.95,
            max_fork_depth: 64,
            report_interval_secs: 1,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
