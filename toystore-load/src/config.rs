//! Run configuration, read once at startup from CLI flags with environment fallbacks.
use clap::Parser;
use gateload::core::{Threshold, ThresholdError, DEFAULT_ITERATIONS, DEFAULT_VUS};
use gateload::core::{HTTP_REQ_DURATION, HTTP_REQ_FAILED};
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION, HOST};
use reqwest::Url;
use std::num::{NonZeroUsize, ParseIntError};
use std::time::Duration;
use thiserror::Error;

pub const TOKEN_ENV: &str = "TOKEN";
pub const GATEWAY_ENV: &str = "KUADRANT_GATEWAY_URL";

/// Virtual host the gateway routes to the toystore API.
pub const TOYSTORE_HOST: &str = "api.toystore.com";
pub const TOY_PATH: &str = "/toy";

pub const SUCCESS_RATE: &str = "success_rate";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid gateway address `{gateway}`: {reason}")]
    InvalidGateway { gateway: String, reason: String },

    #[error("token cannot be sent as a header: {0}")]
    InvalidToken(#[from] InvalidHeaderValue),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid threshold: {0}")]
    Threshold(#[from] ThresholdError),
}

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Load test the toystore route behind a Kuadrant gateway.")]
pub struct Cli {
    /// Bearer token sent with every request.
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Gateway address as `host[:port]`.
    #[arg(long, env = "KUADRANT_GATEWAY_URL")]
    pub gateway_url: Option<String>,

    /// Number of concurrent virtual users. Empty means the default.
    #[arg(long, env = "VUS", default_value_t = DEFAULT_VUS, value_parser = vus_or_default)]
    pub vus: NonZeroUsize,

    /// Total iterations shared across all virtual users. Empty means the default.
    #[arg(
        long,
        env = "ITERATIONS",
        default_value_t = DEFAULT_ITERATIONS,
        value_parser = iterations_or_default
    )]
    pub iterations: u64,

    /// Per-request timeout, e.g. `30s`. Unset leaves requests without a timeout.
    #[arg(long, env = "REQUEST_TIMEOUT")]
    pub request_timeout: Option<humantime::Duration>,

    /// Abandon remaining iterations after this long.
    #[arg(long, env = "MAX_DURATION", default_value = "10m")]
    pub max_duration: humantime::Duration,
}

fn vus_or_default(value: &str) -> Result<NonZeroUsize, ParseIntError> {
    match value.trim() {
        "" => Ok(DEFAULT_VUS),
        value => value.parse(),
    }
}

fn iterations_or_default(value: &str) -> Result<u64, ParseIntError> {
    match value.trim() {
        "" => Ok(DEFAULT_ITERATIONS),
        value => value.parse(),
    }
}

/// Fixed request target: the toy endpoint plus the headers every request carries.
#[derive(Debug, Clone)]
pub struct Target {
    url: Url,
    headers: HeaderMap,
}

impl Target {
    pub fn new(token: &str, gateway: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidGateway {
            gateway: gateway.to_string(),
            reason: reason.to_string(),
        };

        if gateway.contains('/') {
            return Err(invalid("expected host[:port] without scheme or path"));
        }
        let url = Url::parse(&format!("http://{gateway}{TOY_PATH}"))
            .map_err(|err| invalid(&err.to_string()))?;
        if url.path() != TOY_PATH || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("expected host[:port] without query or fragment"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("credentials belong in the token, not the gateway address"));
        }

        let mut authorization = HeaderValue::from_str(&format!("Bearer {token}"))?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(HOST, HeaderValue::from_static(TOYSTORE_HOST));

        Ok(Self { url, headers })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

#[derive(Debug, Clone)]
pub struct ToystoreConfig {
    pub target: Target,
    pub vus: NonZeroUsize,
    pub iterations: u64,
    pub request_timeout: Option<Duration>,
    pub max_duration: Duration,
}

impl ToystoreConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let token = required(cli.token, TOKEN_ENV)?;
        let gateway = required(cli.gateway_url, GATEWAY_ENV)?;

        Ok(Self {
            target: Target::new(&token, &gateway)?,
            vus: cli.vus,
            iterations: cli.iterations,
            request_timeout: cli.request_timeout.map(Into::into),
            max_duration: cli.max_duration.into(),
        })
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Pass/fail criteria for a toystore run.
pub fn toystore_thresholds() -> Result<Vec<Threshold>, ThresholdError> {
    Ok(vec![
        Threshold::new(HTTP_REQ_DURATION, ["p(95)<5000"])?,
        Threshold::new(HTTP_REQ_FAILED, ["rate<0.1"])?,
        Threshold::new(SUCCESS_RATE, ["rate>0.9"])?,
    ])
}
