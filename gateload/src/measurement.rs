use gateload_core::TrendSummary;
use std::fmt;
use std::time::Duration;

/// One progress window: what happened since the previous tick.
#[derive(Debug, Clone)]
pub(crate) struct Measurement {
    pub tps: f64,
    pub error_rate: f64,
    pub iterations: u64,
    pub elapsed: Duration,
    latency: TrendSummary,
}

impl Measurement {
    pub fn new(success: u64, error: u64, iterations: u64, elapsed: Duration) -> Self {
        let total = success + error;
        let secs = elapsed.as_secs_f64();
        let tps = if secs > 0. { total as f64 / secs } else { 0. };
        let error_rate = if total > 0 {
            error as f64 / total as f64
        } else {
            0.
        };
        Self {
            tps,
            error_rate,
            iterations,
            elapsed,
            latency: TrendSummary::new(),
        }
    }

    pub fn populate_latencies(&mut self, dur: &[Duration]) {
        self.latency.extend(dur);
    }

    pub fn latency(&self, quantile: f64) -> Duration {
        self.latency.quantile(quantile).unwrap_or_default()
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Window={:?}, TPS={:.2}, ErrorRate={:.2}, Iterations={}, p50={:?}, p90={:?}, p95={:?}",
            self.elapsed,
            self.tps,
            self.error_rate,
            self.iterations,
            self.latency(0.5),
            self.latency(0.90),
            self.latency(0.95),
        )
    }
}
