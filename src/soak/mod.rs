//! Soak driver.
//!
//! # Data Flow
//! ```text
//! root signal (timer for duration_secs, or Ctrl-C)
//!     → N workers (worker.rs): timeout signal + link + nested forks
//!     → reporter: live timers, root registrations every interval
//!     → SoakReport (report.rs) once every worker has exited
//! ```
//!
//! # Design Decisions
//! - Providers are passed in, never global
//! - Root registrations are the leak indicator: with every link disposed
//!   they stay bounded by the number of workers

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::SoakConfig;
use crate::linked::LinkedSignalProvider;
use crate::observability::metrics;
use crate::signal::CancellationSignal;
use crate::timeout::TimeoutSignalProvider;

pub mod report;
pub mod worker;

pub use report::{SoakReport, SoakStats};
pub use worker::WorkerContext;

/// Run the workload until `root` fires and every worker has drained.
pub async fn run_soak<L>(
    timeouts: Arc<dyn TimeoutSignalProvider>,
    linked: Arc<L>,
    config: SoakConfig,
    root: CancellationSignal,
) -> SoakReport
where
    L: LinkedSignalProvider + 'static,
{
    let started = Instant::now();
    let stats = Arc::new(SoakStats::default());
    let workers = config.workers;
    let report_interval = Duration::from_secs(config.report_interval_secs);

    tracing::info!(
        timeout_provider = timeouts.name(),
        linked_provider = linked.name(),
        workers,
        "Soak started"
    );

    let context = Arc::new(WorkerContext {
        timeouts: timeouts.clone(),
        linked: linked.clone(),
        config,
        stats: stats.clone(),
    });

    let reporter = tokio::spawn(report_progress(
        timeouts.clone(),
        root.clone(),
        stats.clone(),
        report_interval,
    ));

    let mut tasks = JoinSet::new();
    for _ in 0..workers {
        tasks.spawn(context.clone().run(root.clone()));
    }
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Soak worker failed");
        }
    }
    let _ = reporter.await;

    let report = SoakReport {
        timeout_provider: timeouts.name(),
        linked_provider: linked.name(),
        workers,
        elapsed_secs: started.elapsed().as_secs_f64(),
        links: stats.links.load(Ordering::Relaxed),
        forks: stats.forks.load(Ordering::Relaxed),
        completed: stats.completed.load(Ordering::Relaxed),
        cancelled: stats.cancelled.load(Ordering::Relaxed),
        peak_live_timers: stats.peak_live_timers.load(Ordering::Relaxed),
        peak_root_registrations: stats.peak_root_registrations.load(Ordering::Relaxed),
        final_live_timers: timeouts.live_timers(),
    };

    tracing::info!(
        links = report.links,
        links_per_sec = report.links_per_sec(),
        peak_live_timers = report.peak_live_timers,
        peak_root_registrations = report.peak_root_registrations,
        "Soak finished"
    );
    report
}

async fn report_progress(
    timeouts: Arc<dyn TimeoutSignalProvider>,
    root: CancellationSignal,
    stats: Arc<SoakStats>,
    every: Duration,
) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let live_timers = timeouts.live_timers();
                let root_registrations = root.registered_callbacks();
                stats.observe(live_timers, root_registrations);
                metrics::record_root_registrations(root_registrations);

                tracing::info!(
                    live_timers,
                    root_registrations,
                    links = stats.links.load(Ordering::Relaxed),
                    "Soak progress"
                );
            }
            _ = root.cancelled() => break,
        }
    }
}
