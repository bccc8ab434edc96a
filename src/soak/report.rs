//! Soak counters and the final summary.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Counters shared by all workers.
#[derive(Debug, Default)]
pub struct SoakStats {
    pub links: AtomicU64,
    pub forks: AtomicU64,
    pub completed: AtomicU64,
    pub cancelled: AtomicU64,
    pub peak_live_timers: AtomicUsize,
    pub peak_root_registrations: AtomicUsize,
}

impl SoakStats {
    pub fn observe(&self, live_timers: usize, root_registrations: usize) {
        self.peak_live_timers.fetch_max(live_timers, Ordering::Relaxed);
        self.peak_root_registrations
            .fetch_max(root_registrations, Ordering::Relaxed);
    }
}

/// Summary printed when a soak run ends.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SoakReport {
    pub timeout_provider: &'static str,
    pub linked_provider: &'static str,
    pub workers: usize,
    pub elapsed_secs: f64,
    pub links: u64,
    pub forks: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub peak_live_timers: usize,
    pub peak_root_registrations: usize,
    pub final_live_timers: usize,
}

impl SoakReport {
    /// Linked sources created per second.
    pub fn links_per_sec(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.links as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}
