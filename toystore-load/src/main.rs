use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use toystore_load::{toystore_scenario, Cli, ToystoreConfig};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LOG_FILTER: &str = "gateload=info,toystore_load=info";

/// Exit code when the run completed but at least one threshold was crossed.
const THRESHOLDS_CROSSED: u8 = 99;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ToystoreConfig::from_cli(Cli::parse()).context("refusing to start")?;
    info!(
        "Target {} with {} VUs sharing {} iterations",
        config.target.url(),
        config.vus,
        config.iterations
    );

    let stats = toystore_scenario(&config).context("refusing to start")?.await;
    println!("{stats}");

    if stats.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        error!("{} threshold(s) crossed", stats.failed_thresholds().count());
        Ok(ExitCode::from(THRESHOLDS_CROSSED))
    }
}
