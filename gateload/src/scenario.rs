//! Scenario logic and constants
use crate::aggregator::Aggregator;
use crate::executor::{SharedIterations, Timer};
use crate::metrics::MetricRegistry;
use crate::transaction::TransactionData;
use gateload_core::{RunStatistics, ScenarioConfig, Threshold, ThresholdError, PROGRESS_INTERVAL};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use humantime::format_duration;
use std::{
    future::Future,
    num::{NonZeroU32, NonZeroUsize},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Load test scenario structure
///
/// Wraps the function run once per iteration together with its run configuration. Awaiting a
/// `Scenario` runs it to completion and yields the [`RunStatistics`].
///
/// # Example
/// ```no_run
/// use gateload::prelude::*;
/// use std::num::NonZeroUsize;
///
/// #[tokio::main]
/// async fn main() {
///     let stats = Scenario::new("my_scenario", || async {})
///         .vus(NonZeroUsize::new(4).unwrap())
///         .iterations(100)
///         .await;
///     assert!(stats.passed());
/// }
/// ```
#[pin_project::pin_project]
pub struct Scenario<T> {
    func: T,
    runner_fut: Option<Pin<Box<dyn Future<Output = RunStatistics> + Send>>>,
    config: ScenarioConfig,
}

impl<T> Scenario<T> {
    pub fn new(name: &str, func: T) -> Self {
        Self {
            func,
            runner_fut: None,
            config: ScenarioConfig::new(name),
        }
    }

    /// Number of concurrent virtual users. Defaults to 10.
    pub fn vus(mut self, vus: NonZeroUsize) -> Self {
        self.config.vus = vus;
        self
    }

    /// Total number of iterations shared across all virtual users. Defaults to 1000.
    pub fn iterations(mut self, iterations: u64) -> Self {
        self.config.iterations = iterations;
        self
    }

    /// Add a pass/fail threshold, evaluated once the run completes.
    ///
    /// # Example
    /// ```no_run
    /// use gateload::prelude::*;
    ///
    /// # async fn run() -> Result<(), ThresholdError> {
    /// let stats = Scenario::new("my_scenario", || async {})
    ///     .threshold(Threshold::new("http_req_duration", ["p(95)<5000"])?)
    ///     .threshold(Threshold::new("http_req_failed", ["rate<0.1"])?)
    ///     .await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn threshold(mut self, threshold: Threshold) -> Self {
        self.config.thresholds.push(threshold);
        self
    }

    /// Parse and add a threshold in one step.
    pub fn try_threshold<I, S>(self, metric: &str, exprs: I) -> Result<Self, ThresholdError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.threshold(Threshold::new(metric, exprs)?))
    }

    pub fn thresholds(mut self, thresholds: impl IntoIterator<Item = Threshold>) -> Self {
        self.config.thresholds.extend(thresholds);
        self
    }

    /// Stop the run after this long even if iterations remain. Defaults to 10 minutes.
    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.config.max_duration = duration;
        self
    }

    /// Cap the rate of transactions across all virtual users.
    pub fn tps(mut self, tps: NonZeroU32) -> Self {
        self.config.max_tps = Some(tps);
        self
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }
}

impl<T, F> Future for Scenario<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    type Output = RunStatistics;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.runner_fut.is_none() {
            let func = self.func.clone();
            let config = self.config.clone();
            self.runner_fut = Some(Box::pin(async move { run_scenario(func, config).await }));
        }

        match &mut self.runner_fut {
            Some(runner) => runner.as_mut().poll(cx),
            None => unreachable!(),
        }
    }
}

#[instrument(name="scenario", skip_all, fields(name=config.name))]
pub(crate) async fn run_scenario<T, F>(scenario: T, config: ScenarioConfig) -> RunStatistics
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    info!("Running {} with config {:?}", config.name, &config);

    let start = Instant::now();

    let registry = Arc::new(MetricRegistry::new());
    let data = TransactionData {
        limiter: config.max_tps.map(|tps| Arc::new(rate_limiter(tps))),
        registry: registry.clone(),
    };
    let mut aggregator = Aggregator::new(registry);

    let vus = config.effective_vus();
    let mut pool = SharedIterations::new(scenario, config.iterations, data);
    pool.spawn_vus(vus);
    debug!("Spawned {} VUs for {} iterations", pool.vus(), config.iterations);

    let mut timer = Timer::new(PROGRESS_INTERVAL).await;
    debug!("Reporting progress every {timer}");
    let deadline = tokio::time::sleep(config.max_duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            finished = pool.join_next() => {
                if finished.is_none() {
                    break;
                }
            }
            elapsed = timer.tick() => {
                let measurement = aggregator.collect(elapsed);
                info!("{measurement} ({} VUs active)", pool.vus());
            }
            _ = &mut deadline => {
                warn!(
                    "Maximum duration of {} reached; abandoning remaining iterations.",
                    format_duration(config.max_duration)
                );
                pool.shutdown().await;
                break;
            }
        }
    }

    let last_window = aggregator.collect(timer.since_last_tick());
    debug!("Final window: {last_window}");

    let summary = aggregator.finish(start.elapsed());
    let thresholds = config
        .thresholds
        .iter()
        .flat_map(|t| t.evaluate(&summary))
        .collect();
    let stats = RunStatistics::new(&config.name, vus, summary, thresholds);

    for outcome in stats.failed_thresholds() {
        warn!("Threshold crossed: {outcome}");
    }
    info!(
        "Scenario complete: {} iterations in {}, thresholds {}",
        stats.iterations,
        format_duration(Duration::from_millis(stats.elapsed.as_millis() as u64)),
        if stats.passed() { "passed" } else { "failed" },
    );

    stats
}

fn rate_limiter(tps_limit: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps_limit).allow_burst(NonZeroU32::MIN))
}
