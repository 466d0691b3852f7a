use crate::threshold::Threshold;
use crate::{DEFAULT_ITERATIONS, DEFAULT_MAX_DURATION, DEFAULT_VUS};
use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

/// Run parameters for a single scenario. Built once before the run and never mutated while it is
/// active.
#[doc(hidden)]
#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    pub name: String,
    pub vus: NonZeroUsize,
    pub iterations: u64,
    pub thresholds: Vec<Threshold>,
    pub max_duration: Duration,
    pub max_tps: Option<NonZeroU32>,
}

impl ScenarioConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vus: DEFAULT_VUS,
            iterations: DEFAULT_ITERATIONS,
            thresholds: vec![],
            max_duration: DEFAULT_MAX_DURATION,
            max_tps: None,
        }
    }

    /// Number of workers actually started. There is no point in spawning more workers than
    /// there are iterations to share.
    pub fn effective_vus(&self) -> usize {
        let iterations = usize::try_from(self.iterations).unwrap_or(usize::MAX);
        self.vus.get().min(iterations)
    }
}
