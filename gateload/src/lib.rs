#![doc = include_str!("../README.md")]

// Lets `#[transaction]` expansions resolve `::gateload` inside this crate's own tests.
extern crate self as gateload;

pub mod metrics;
pub mod scenario;
#[doc(hidden)]
pub mod transaction;

mod aggregator;
mod executor;
mod measurement;

pub use gateload_core as core;
pub use gateload_core::{RunStatistics, Threshold};
pub use gateload_macros::transaction;
pub use scenario::Scenario;

pub mod prelude {
    pub use crate::metrics::{Counter, Rate};
    pub use crate::scenario::Scenario;
    pub use gateload_core::{RunStatistics, Threshold, ThresholdError};
    pub use gateload_macros::transaction;
}
