//! Metric storage shared by every virtual user of a running scenario.
//!
//! Samples are written through atomics and lock-free buckets. A single aggregator drains them
//! while the run is active (see `aggregator.rs`).
use crate::transaction::TRANSACTION_HOOK;
use gateload_core::RateSummary;
use metrics_util::AtomicBucket;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Default)]
pub(crate) struct RateAtomics {
    trues: AtomicU64,
    falses: AtomicU64,
}

impl RateAtomics {
    pub fn add(&self, value: bool) {
        if value {
            self.trues.fetch_add(1, Ordering::Relaxed);
        } else {
            self.falses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn load(&self) -> RateSummary {
        RateSummary {
            trues: self.trues.load(Ordering::Relaxed),
            falses: self.falses.load(Ordering::Relaxed),
        }
    }
}

pub(crate) struct MetricRegistry {
    pub http_reqs: AtomicU64,
    pub http_req_failed: RateAtomics,
    pub http_req_duration: AtomicBucket<Duration>,
    pub iterations: AtomicU64,
    pub iteration_duration: AtomicBucket<Duration>,
    rates: RwLock<HashMap<&'static str, RateAtomics>>,
    counters: RwLock<HashMap<&'static str, AtomicU64>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            http_reqs: AtomicU64::new(0),
            http_req_failed: RateAtomics::default(),
            http_req_duration: AtomicBucket::new(),
            iterations: AtomicU64::new(0),
            iteration_duration: AtomicBucket::new(),
            rates: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_transaction(&self, elapsed: Duration, failed: bool) {
        self.http_reqs.fetch_add(1, Ordering::Relaxed);
        self.http_req_duration.push(elapsed);
        self.http_req_failed.add(failed);
    }

    pub fn record_iteration(&self, elapsed: Duration) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
        self.iteration_duration.push(elapsed);
    }

    pub fn record_rate(&self, name: &'static str, value: bool) {
        {
            let rates = self.rates.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(rate) = rates.get(name) {
                rate.add(value);
                return;
            }
        }

        self.rates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_default()
            .add(value);
    }

    pub fn record_counter(&self, name: &'static str, value: u64) {
        {
            let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(counter) = counters.get(name) {
                counter.fetch_add(value, Ordering::Relaxed);
                return;
            }
        }

        self.counters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_default()
            .fetch_add(value, Ordering::Relaxed);
    }

    pub fn custom_rates(&self) -> Vec<(&'static str, RateSummary)> {
        self.rates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, rate)| (*name, rate.load()))
            .collect()
    }

    pub fn custom_counters(&self) -> Vec<(&'static str, u64)> {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, count)| (*name, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// A named boolean metric. Its aggregated value is the fraction of `true` samples.
///
/// Declare it as a `static` and call [`Rate::add`] from within a scenario.
///
/// # Example
/// ```no_run
/// use gateload::prelude::*;
///
/// static SUCCESS_RATE: Rate = Rate::new("success_rate");
///
/// async fn iteration() {
///     SUCCESS_RATE.add(true);
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Rate {
    name: &'static str,
}

impl Rate {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn add(&self, value: bool) {
        let recorded = TRANSACTION_HOOK
            .try_with(|hook| hook.registry.record_rate(self.name, value))
            .is_ok();
        if !recorded {
            warn!("Rate {} recorded outside of a running scenario.", self.name);
        }

        #[cfg(feature = "metrics")]
        metrics::counter!(self.name, "value" => if value { "true" } else { "false" }).increment(1);
    }
}

/// A named monotonically increasing counter.
#[derive(Debug, Clone, Copy)]
pub struct Counter {
    name: &'static str,
}

impl Counter {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn add(&self, value: u64) {
        let recorded = TRANSACTION_HOOK
            .try_with(|hook| hook.registry.record_counter(self.name, value))
            .is_ok();
        if !recorded {
            warn!("Counter {} recorded outside of a running scenario.", self.name);
        }

        #[cfg(feature = "metrics")]
        metrics::counter!(self.name).increment(value);
    }
}
