//! Shared-iterations executor.
//!
//! A fixed pool of virtual users draws from one atomic iteration counter. Every claimed
//! iteration runs the scenario function exactly once; a user exits when the counter is empty.
use crate::transaction::{TransactionData, TRANSACTION_HOOK};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

mod timer;

pub(crate) use timer::Timer;

pub(crate) struct SharedIterations<T> {
    scenario: T,
    tasks: JoinSet<()>,
    remaining: Arc<AtomicU64>,
    data: TransactionData,
}

impl<T, F> SharedIterations<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    pub fn new(scenario: T, iterations: u64, data: TransactionData) -> Self {
        Self {
            scenario,
            tasks: JoinSet::new(),
            remaining: Arc::new(AtomicU64::new(iterations)),
            data,
        }
    }

    pub fn spawn_vus(&mut self, vus: usize) {
        for vu in 0..vus {
            let scenario = self.scenario.clone();
            let remaining = self.remaining.clone();
            let registry = self.data.registry.clone();

            self.tasks.spawn(
                TRANSACTION_HOOK
                    .scope(self.data.clone(), async move {
                        while claim(&remaining) {
                            let start = Instant::now();
                            scenario().await;
                            registry.record_iteration(start.elapsed());
                        }
                        trace!("VU {vu} out of iterations.");
                    })
                    .in_current_span(),
            );
        }
    }

    pub fn vus(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next virtual user to finish. `None` once every user has exited.
    pub async fn join_next(&mut self) -> Option<()> {
        let res = self.tasks.join_next().await?;
        if let Err(err) = res {
            if err.is_panic() {
                error!("Virtual user panicked; its in-flight iteration is lost.");
            }
        }
        Some(())
    }

    /// Abort every virtual user and wait for them to unwind.
    pub async fn shutdown(&mut self) {
        self.remaining.store(0, Ordering::Relaxed);
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
    }
}

fn claim(remaining: &AtomicU64) -> bool {
    remaining
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricRegistry;
    use std::time::Duration;

    fn data() -> TransactionData {
        TransactionData {
            limiter: None,
            registry: Arc::new(MetricRegistry::new()),
        }
    }

    #[test]
    fn claim_stops_at_zero() {
        let remaining = AtomicU64::new(2);
        assert!(claim(&remaining));
        assert!(claim(&remaining));
        assert!(!claim(&remaining));
        assert_eq!(remaining.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn runs_exact_iteration_count() {
        let counter = Arc::new(AtomicU64::new(0));
        let scenario = {
            let counter = counter.clone();
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            }
        };

        let data = data();
        let registry = data.registry.clone();
        let mut pool = SharedIterations::new(scenario, 1_003, data);
        pool.spawn_vus(7);
        assert_eq!(pool.vus(), 7);
        while pool.join_next().await.is_some() {}

        assert_eq!(counter.load(Ordering::Relaxed), 1_003);
        assert_eq!(registry.iterations.load(Ordering::Relaxed), 1_003);
    }

    #[tokio::test]
    async fn shutdown_abandons_remaining_iterations() {
        let counter = Arc::new(AtomicU64::new(0));
        let scenario = {
            let counter = counter.clone();
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
            }
        };

        let mut pool = SharedIterations::new(scenario, 100, data());
        pool.spawn_vus(2);
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.shutdown().await;

        assert_eq!(pool.vus(), 0);
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }
}
