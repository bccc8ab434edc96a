//! Shared utilities for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cancel_coalesce::CancellationSignal;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Attach a callback that counts how many times it ran.
#[allow(dead_code)]
pub fn count_fires(signal: &CancellationSignal) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    signal.register(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    count
}

/// Wait for a signal, giving up after `limit`.
#[allow(dead_code)]
pub async fn fires_within(signal: &CancellationSignal, limit: Duration) -> bool {
    tokio::time::timeout(limit, signal.cancelled()).await.is_ok()
}

/// Deterministic pseudo-random durations in `[1, max_ms]`.
#[allow(dead_code)]
pub fn random_durations(seed: u64, count: usize, max_ms: u64) -> Vec<Duration> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| Duration::from_millis(rng.gen_range(1..=max_ms)))
        .collect()
}
