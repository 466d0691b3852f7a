use crate::measurement::Measurement;
use crate::metrics::MetricRegistry;
use gateload_core::{
    MetricValue, RateSummary, Summary, TrendSummary, HTTP_REQS, HTTP_REQ_DURATION,
    HTTP_REQ_FAILED, ITERATIONS, ITERATION_DURATION,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Single consumer of the registry's sample buckets.
///
/// Virtual users only ever append; the aggregator drains on every progress tick so the buckets
/// stay small, and folds the samples into cumulative trends for the final summary.
pub(crate) struct Aggregator {
    registry: Arc<MetricRegistry>,
    http_req_duration: TrendSummary,
    iteration_duration: TrendSummary,
    last_failed: RateSummary,
    last_iterations: u64,
}

impl Aggregator {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self {
            registry,
            http_req_duration: TrendSummary::new(),
            iteration_duration: TrendSummary::new(),
            last_failed: RateSummary::default(),
            last_iterations: 0,
        }
    }

    pub fn collect(&mut self, elapsed: Duration) -> Measurement {
        let failed = self.registry.http_req_failed.load();
        let error = failed.trues.saturating_sub(self.last_failed.trues);
        let success = failed.falses.saturating_sub(self.last_failed.falses);
        self.last_failed = failed;

        let iterations = self.registry.iterations.load(Ordering::Relaxed);
        let window_iterations = iterations.saturating_sub(self.last_iterations);
        self.last_iterations = iterations;

        let mut measurement = Measurement::new(success, error, window_iterations, elapsed);
        let trend = &mut self.http_req_duration;
        self.registry.http_req_duration.clear_with(|dur| {
            trend.extend(dur);
            measurement.populate_latencies(dur);
        });
        self.drain_iteration_durations();

        measurement
    }

    pub fn finish(mut self, elapsed: Duration) -> Summary {
        let trend = &mut self.http_req_duration;
        self.registry
            .http_req_duration
            .clear_with(|dur| trend.extend(dur));
        self.drain_iteration_durations();

        let mut summary = Summary::new(elapsed);
        for (name, rate) in self.registry.custom_rates() {
            summary.insert(name, MetricValue::Rate(rate));
        }
        for (name, count) in self.registry.custom_counters() {
            summary.insert(name, MetricValue::Counter(count));
        }

        summary.insert(
            HTTP_REQS,
            MetricValue::Counter(self.registry.http_reqs.load(Ordering::Relaxed)),
        );
        summary.insert(
            HTTP_REQ_FAILED,
            MetricValue::Rate(self.registry.http_req_failed.load()),
        );
        summary.insert(
            HTTP_REQ_DURATION,
            MetricValue::Trend(self.http_req_duration),
        );
        summary.insert(
            ITERATIONS,
            MetricValue::Counter(self.registry.iterations.load(Ordering::Relaxed)),
        );
        summary.insert(
            ITERATION_DURATION,
            MetricValue::Trend(self.iteration_duration),
        );
        summary
    }

    fn drain_iteration_durations(&mut self) {
        let trend = &mut self.iteration_duration;
        self.registry
            .iteration_duration
            .clear_with(|dur| trend.extend(dur));
    }
}
