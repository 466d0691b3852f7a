use pdatastructs::tdigest::{TDigest, K1};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Aggregated duration samples.
///
/// Quantiles come from a t-digest, so they are estimates. Count, min, max and mean are exact.
#[derive(Debug, Clone)]
pub struct TrendSummary {
    count: u64,
    sum: Duration,
    min: Duration,
    max: Duration,
    latency: TDigest<K1>,
}

impl TrendSummary {
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
            latency: default_tdigest(),
        }
    }

    pub fn push(&mut self, sample: Duration) {
        self.count += 1;
        self.sum += sample;
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
        // Whole microseconds keep centroid sums exact, so a centroid mean never lands outside
        // the samples it was fused from.
        self.latency.insert(sample.as_micros() as f64);
    }

    pub fn extend(&mut self, samples: &[Duration]) {
        for sample in samples {
            self.push(*sample);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn min(&self) -> Option<Duration> {
        (!self.is_empty()).then_some(self.min)
    }

    pub fn max(&self) -> Option<Duration> {
        (!self.is_empty()).then_some(self.max)
    }

    pub fn avg(&self) -> Option<Duration> {
        (!self.is_empty()).then(|| {
            let nanos = self.sum.as_nanos() / u128::from(self.count);
            Duration::from_nanos(nanos as u64)
        })
    }

    pub fn quantile(&self, quantile: f64) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }

        if self.min == self.max {
            return Some(self.min);
        }

        let micros = self.latency.quantile(quantile);
        if !micros.is_finite() {
            error!("Non-finite quantile estimate; falling back to the maximum sample.");
            return Some(self.max);
        }

        // The digest interpolates between centroids and can overshoot the exact extremes.
        Some(Duration::from_micros(micros.round() as u64).clamp(self.min, self.max))
    }
}

impl Default for TrendSummary {
    fn default() -> Self {
        Self::new()
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

/// Boolean samples. `rate` is the fraction of samples that were `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateSummary {
    pub trues: u64,
    pub falses: u64,
}

impl RateSummary {
    pub fn total(&self) -> u64 {
        self.trues + self.falses
    }

    pub fn rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.trues as f64 / total as f64),
        }
    }
}

#[derive(Debug, Clone)]
pub enum MetricValue {
    Counter(u64),
    Rate(RateSummary),
    Trend(TrendSummary),
}

impl MetricValue {
    /// Whether any sample was ever recorded for this metric.
    pub fn has_data(&self) -> bool {
        match self {
            MetricValue::Counter(count) => *count > 0,
            MetricValue::Rate(rate) => rate.total() > 0,
            MetricValue::Trend(trend) => !trend.is_empty(),
        }
    }
}

/// Final aggregated values of every metric touched during a run.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub elapsed: Duration,
    metrics: BTreeMap<String, MetricValue>,
}

impl Summary {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            elapsed,
            metrics: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: MetricValue) {
        self.metrics.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.metrics.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            MetricValue::Counter(count) => Some(*count),
            _ => None,
        }
    }

    pub fn rate(&self, name: &str) -> Option<RateSummary> {
        match self.get(name)? {
            MetricValue::Rate(rate) => Some(*rate),
            _ => None,
        }
    }

    pub fn trend(&self, name: &str) -> Option<&TrendSummary> {
        match self.get(name)? {
            MetricValue::Trend(trend) => Some(trend),
            _ => None,
        }
    }
}
