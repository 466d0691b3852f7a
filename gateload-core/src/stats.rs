use crate::data::{MetricValue, Summary};
use crate::threshold::ThresholdOutcome;
use crate::{HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED, ITERATIONS};
use humantime::format_duration;
use std::fmt;
use std::time::Duration;

/// Statistics for a completed Scenario run, including the threshold verdict.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub name: String,
    pub vus: usize,
    pub iterations: u64,
    pub elapsed: Duration,
    pub actual_tps: f64,
    pub error_rate: f64,
    pub latency_p50: Duration,
    pub latency_p90: Duration,
    pub latency_p95: Duration,
    pub latency_p99: Duration,
    pub summary: Summary,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunStatistics {
    pub fn new(
        name: &str,
        vus: usize,
        summary: Summary,
        thresholds: Vec<ThresholdOutcome>,
    ) -> Self {
        let elapsed = summary.elapsed;
        let requests = summary.counter(HTTP_REQS).unwrap_or(0);
        let actual_tps = if elapsed.is_zero() {
            0.
        } else {
            requests as f64 / elapsed.as_secs_f64()
        };
        let error_rate = summary
            .rate(HTTP_REQ_FAILED)
            .and_then(|r| r.rate())
            .unwrap_or(0.);
        let latency = |q: f64| {
            summary
                .trend(HTTP_REQ_DURATION)
                .and_then(|t| t.quantile(q))
                .unwrap_or_default()
        };

        Self {
            name: name.to_string(),
            vus,
            iterations: summary.counter(ITERATIONS).unwrap_or(0),
            elapsed,
            actual_tps,
            error_rate,
            latency_p50: latency(0.5),
            latency_p90: latency(0.9),
            latency_p95: latency(0.95),
            latency_p99: latency(0.99),
            summary,
            thresholds,
        }
    }

    /// True when every threshold expression held.
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    pub fn rate(&self, metric: &str) -> Option<f64> {
        self.summary.rate(metric)?.rate()
    }

    pub fn count(&self, metric: &str) -> Option<u64> {
        self.summary.counter(metric)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.thresholds.iter().filter(|t| !t.passed)
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scenario {}: {} iterations, {} vus, {}",
            self.name,
            self.iterations,
            self.vus,
            format_duration(truncate_to_millis(self.elapsed)),
        )?;

        for (name, value) in self.summary.iter() {
            write!(f, "  {name:.<28} ")?;
            match value {
                MetricValue::Counter(count) => {
                    let secs = self.elapsed.as_secs_f64();
                    let per_sec = if secs > 0. { *count as f64 / secs } else { 0. };
                    writeln!(f, "{count} {per_sec:.2}/s")?;
                }
                MetricValue::Rate(rate) => {
                    let pct = rate.rate().unwrap_or(0.) * 100.;
                    writeln!(f, "{pct:.2}% ✓ {} ✗ {}", rate.trues, rate.falses)?;
                }
                MetricValue::Trend(trend) => {
                    let ms = |d: Option<Duration>| d.unwrap_or_default().as_secs_f64() * 1_000.;
                    writeln!(
                        f,
                        "avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms",
                        ms(trend.avg()),
                        ms(trend.min()),
                        ms(trend.quantile(0.5)),
                        ms(trend.max()),
                        ms(trend.quantile(0.9)),
                        ms(trend.quantile(0.95)),
                    )?;
                }
            }
        }

        if !self.thresholds.is_empty() {
            writeln!(f, "thresholds:")?;
            for outcome in &self.thresholds {
                writeln!(f, "  {outcome}")?;
            }
        }

        Ok(())
    }
}

fn truncate_to_millis(dur: Duration) -> Duration {
    Duration::from_millis(dur.as_millis() as u64)
}
