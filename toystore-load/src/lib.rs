//! Load test for the toystore API behind a Kuadrant gateway.
//!
//! Every iteration sends one authenticated `GET /toy` and records whether the gateway answered
//! `200 OK` into the `success_rate` metric.
pub mod config;
pub mod scenario;

pub use config::{Cli, ConfigError, Target, ToystoreConfig};
pub use scenario::{toystore_scenario, ToyClient};
