use std::num::NonZeroUsize;
use std::time::Duration;

/// The default number of virtual users.
pub const DEFAULT_VUS: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(10) };

/// The default number of iterations shared across all virtual users.
pub const DEFAULT_ITERATIONS: u64 = 1000;

/// Upper bound on a run's wall-clock time before remaining iterations are abandoned.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(10 * 60);

/// How often progress measurements are logged while a run is active.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";
