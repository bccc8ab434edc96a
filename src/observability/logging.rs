//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor config provide one.
pub const DEFAULT_DIRECTIVE: &str = "cancel_coalesce=info";

/// Build the filter directive for a configured log level.
pub fn directive_for(log_level: &str) -> String {
    if log_level.trim().is_empty() {
        DEFAULT_DIRECTIVE.to_string()
    } else {
        format!("cancel_coalesce={}", log_level.trim())
    }
}

/// Install the global subscriber.
pub fn init_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| directive_for(log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
