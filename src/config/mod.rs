//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CoalesceConfig (validated, immutable)
//!     → ProviderConfig handed to provider constructors
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; providers never observe changes
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CoalesceConfig, LinkedProviderKind, ObservabilityConfig, ProviderConfig, SoakConfig,
    TimeoutProviderKind,
};
