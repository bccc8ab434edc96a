//! Soak driver for the cancellation signal providers.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                  soak workers                 │
//!                 └──────┬──────────────────────────────┬─────────┘
//!                        │ get_signal(d)                │ get_linked_source(a, b)
//!                        ▼                              ▼
//!           ┌────────────────────────┐      ┌────────────────────────┐
//!           │        timeout         │      │         linked         │
//!           │ direct │ coalescing │  │      │  atomic │ framework    │
//!           │        │  pooled       │      │                        │
//!           └───────────┬────────────┘      └───────────┬────────────┘
//!                       │ arm(d)                        │ register / unregister
//!                       ▼                               ▼
//!           ┌────────────────────────────────────────────────────────┐
//!           │   signal: CancellationSource / Signal / TimerFactory   │
//!           └────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use cancel_coalesce::config::{
    load_config, CoalesceConfig, LinkedProviderKind, TimeoutProviderKind,
};
use cancel_coalesce::lifecycle::signals::{cancel_on_interrupt, join_listener};
use cancel_coalesce::observability::{logging, metrics};
use cancel_coalesce::signal::TimerFactory;
use cancel_coalesce::soak::{run_soak, SoakReport};
use cancel_coalesce::{
    AtomicLinkedProvider, CancellationSignal, CoalescingTimeoutProvider, DirectTimeoutProvider,
    FrameworkLinkedProvider, PooledTimeoutProvider, TimeoutSignalProvider,
};

#[derive(Parser)]
#[command(name = "cancel-coalesce")]
#[command(about = "Soak test for coalesced and pooled cancellation signals", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    timeout_provider: Option<TimeoutArg>,

    #[arg(long, value_enum)]
    linked_provider: Option<LinkedArg>,

    /// Override soak.duration_secs.
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Override soak.workers.
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum TimeoutArg {
    Direct,
    Coalescing,
    Pooled,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum LinkedArg {
    Atomic,
    Framework,
}

impl Cli {
    fn apply(&self, config: &mut CoalesceConfig) {
        if let Some(kind) = self.timeout_provider {
            config.soak.timeout_provider = match kind {
                TimeoutArg::Direct => TimeoutProviderKind::Direct,
                TimeoutArg::Coalescing => TimeoutProviderKind::Coalescing,
                TimeoutArg::Pooled => TimeoutProviderKind::Pooled,
            };
        }
        if let Some(kind) = self.linked_provider {
            config.soak.linked_provider = match kind {
                LinkedArg::Atomic => LinkedProviderKind::Atomic,
                LinkedArg::Framework => LinkedProviderKind::Framework,
            };
        }
        if let Some(secs) = self.duration_secs {
            config.soak.duration_secs = secs;
        }
        if let Some(workers) = self.workers {
            config.soak.workers = workers;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CoalesceConfig::default(),
    };
    cli.apply(&mut config);
    cancel_coalesce::config::validation::validate_config(&config)
        .map_err(cancel_coalesce::config::ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("cancel-coalesce v0.1.0 starting");

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let timeouts: Arc<dyn TimeoutSignalProvider> = match config.soak.timeout_provider {
        TimeoutProviderKind::Direct => Arc::new(DirectTimeoutProvider::new()?),
        TimeoutProviderKind::Coalescing => {
            Arc::new(CoalescingTimeoutProvider::from_config(&config.provider)?)
        }
        TimeoutProviderKind::Pooled => Arc::new(PooledTimeoutProvider::from_config(&config.provider)?),
    };

    let root = Arc::new(TimerFactory::current("root")?.arm(Duration::from_secs(config.soak.duration_secs)));
    let interrupt = cancel_on_interrupt(root.clone());
    let root_signal: CancellationSignal = root.signal();

    let report: SoakReport = match config.soak.linked_provider {
        LinkedProviderKind::Atomic => {
            run_soak(timeouts, Arc::new(AtomicLinkedProvider), config.soak.clone(), root_signal).await
        }
        LinkedProviderKind::Framework => {
            run_soak(timeouts, Arc::new(FrameworkLinkedProvider), config.soak.clone(), root_signal).await
        }
    };

    join_listener(interrupt).await;
    root.dispose();

    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::info!("Shutdown complete");
    Ok(())
}
