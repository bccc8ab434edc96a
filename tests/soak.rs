//! Short soak runs on the paused clock.

use std::sync::Arc;
use std::time::Duration;

use cancel_coalesce::config::{SoakConfig, TimeoutProviderKind};
use cancel_coalesce::signal::TimerFactory;
use cancel_coalesce::soak::run_soak;
use cancel_coalesce::{
    AtomicLinkedProvider, CoalescingTimeoutProvider, DirectTimeoutProvider, FrameworkLinkedProvider,
    PooledTimeoutProvider, ProviderConfig, TimeoutSignalProvider,
};

mod common;

fn small_soak() -> SoakConfig {
    SoakConfig {
        workers: 16,
        duration_secs: 3,
        max_timeout_ms: 400,
        max_work_ms: 50,
        fork_probability: 0.5,
        max_fork_depth: 4,
        report_interval_secs: 1,
        ..SoakConfig::default()
    }
}

fn provider(kind: TimeoutProviderKind) -> Arc<dyn TimeoutSignalProvider> {
    let config = ProviderConfig {
        tolerance_ms: 20,
        max_duration_ms: 1_000,
    };
    match kind {
        TimeoutProviderKind::Direct => Arc::new(DirectTimeoutProvider::new().unwrap()),
        TimeoutProviderKind::Coalescing => Arc::new(CoalescingTimeoutProvider::from_config(&config).unwrap()),
        TimeoutProviderKind::Pooled => Arc::new(PooledTimeoutProvider::from_config(&config).unwrap()),
    }
}

#[tokio::test(start_paused = true)]
async fn test_atomic_soak_drains_every_provider() {
    for kind in [
        TimeoutProviderKind::Direct,
        TimeoutProviderKind::Coalescing,
        TimeoutProviderKind::Pooled,
    ] {
        let config = small_soak();
        let timeouts = provider(kind);
        let root = TimerFactory::current("root")
            .unwrap()
            .arm(Duration::from_secs(config.duration_secs));

        let report = run_soak(timeouts.clone(), Arc::new(AtomicLinkedProvider), config.clone(), root.signal()).await;

        assert!(report.links > 0, "{kind:?}: no links created");
        assert!(report.links >= report.forks);
        assert!(report.peak_root_registrations <= config.workers);
        assert_eq!(root.signal().registered_callbacks(), 0);

        // Outstanding timeout timers run out once their windows pass.
        tokio::time::sleep(Duration::from_millis(config.max_timeout_ms + 50)).await;
        assert_eq!(timeouts.live_timers(), 0, "{kind:?}: timers left behind");
    }
}

#[tokio::test(start_paused = true)]
async fn test_framework_soak_completes() {
    let config = small_soak();
    let timeouts = provider(TimeoutProviderKind::Coalescing);
    let root = TimerFactory::current("root")
        .unwrap()
        .arm(Duration::from_secs(config.duration_secs));

    let report = run_soak(timeouts, Arc::new(FrameworkLinkedProvider), config.clone(), root.signal()).await;

    assert!(report.links > 0);
    assert_eq!(report.linked_provider, "framework");
    assert!(common::fires_within(&root.signal(), Duration::ZERO).await);
}

#[tokio::test(start_paused = true)]
async fn test_root_already_cancelled_runs_nothing() {
    let config = small_soak();
    let root = cancel_coalesce::CancellationSignal::already_cancelled();

    let report = run_soak(provider(TimeoutProviderKind::Pooled), Arc::new(AtomicLinkedProvider), config, root).await;

    assert_eq!(report.links, 0);
    assert_eq!(report.final_live_timers, 0);
}
