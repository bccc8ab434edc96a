//! Soak worker loop.
//!
//! Each iteration links the root signal with a fresh timeout signal, runs a
//! unit of work gated on the linked signal, then disposes it. A unit of work
//! forks a nested link (parent linked signal + another timeout) with
//! `fork_probability`, so links stack up several levels deep before the
//! innermost one waits.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::config::SoakConfig;
use crate::linked::{LinkedSignalProvider, LinkedSource};
use crate::signal::CancellationSignal;
use crate::soak::report::SoakStats;
use crate::timeout::TimeoutSignalProvider;

/// Everything a worker needs, shared between all workers.
pub struct WorkerContext<L> {
    pub timeouts: Arc<dyn TimeoutSignalProvider>,
    pub linked: Arc<L>,
    pub config: SoakConfig,
    pub stats: Arc<SoakStats>,
}

impl<L: LinkedSignalProvider> WorkerContext<L> {
    fn random_timeout(&self) -> Duration {
        let ms = rand::thread_rng().gen_range(1..=self.config.max_timeout_ms);
        Duration::from_millis(ms)
    }

    /// Loop until `root` fires.
    pub async fn run(self: Arc<Self>, root: CancellationSignal) {
        while !root.is_cancelled() {
            let timeout = self.timeouts.get_signal(self.random_timeout());
            let link = self.linked.get_linked_source(&root, &timeout);
            self.stats.links.fetch_add(1, Ordering::Relaxed);

            self.run_unit(link.signal(), 0).await;
            link.dispose();
        }
    }

    fn run_unit(&self, signal: CancellationSignal, depth: u32) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let (fork, delay_ms) = {
                let mut rng = rand::thread_rng();
                (
                    depth < self.config.max_fork_depth && rng.gen_bool(self.config.fork_probability),
                    rng.gen_range(1..=self.config.max_work_ms),
                )
            };

            if fork {
                let timeout = self.timeouts.get_signal(self.random_timeout());
                let link = self.linked.get_linked_source(&signal, &timeout);
                self.stats.links.fetch_add(1, Ordering::Relaxed);
                self.stats.forks.fetch_add(1, Ordering::Relaxed);

                self.run_unit(link.signal(), depth + 1).await;
                link.dispose();
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {
                    self.stats.completed.fetch_add(1, Ordering::Relaxed);
                }
                _ = signal.cancelled() => {
                    self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
                }
            }
        })
    }
}
