use crate::config::{toystore_thresholds, ConfigError, Target, ToystoreConfig, SUCCESS_RATE};
use gateload::prelude::*;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

static TOY_SUCCESS: Rate = Rate::new(SUCCESS_RATE);

#[derive(Debug, Error)]
pub enum ToyError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),
}

/// HTTP client bound to the fixed toystore target.
#[derive(Debug, Clone)]
pub struct ToyClient {
    http: Client,
    target: Target,
}

impl ToyClient {
    pub fn new(config: &ToystoreConfig) -> Result<Self, ConfigError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            target: config.target.clone(),
        })
    }
}

/// One `GET /toy`. Transport errors and statuses outside 200..=399 count as failed requests.
#[transaction]
pub async fn get_toy(client: &ToyClient) -> Result<StatusCode, ToyError> {
    let res = client
        .http
        .get(client.target.url().clone())
        .headers(client.target.headers().clone())
        .send()
        .await?;

    let status = res.status();
    if !(200..400).contains(&status.as_u16()) {
        return Err(ToyError::Status(status));
    }
    Ok(status)
}

/// A single iteration: one request, one success sample. Failures never abort the run.
pub async fn toy_iteration(client: &ToyClient) {
    let passed = match get_toy(client).await {
        Ok(status) => status == StatusCode::OK,
        Err(err) => {
            debug!("GET {} failed: {err}", client.target.url());
            false
        }
    };
    TOY_SUCCESS.add(passed);
}

/// Build the toystore scenario. Nothing is sent until the returned future is awaited.
pub fn toystore_scenario(
    config: &ToystoreConfig,
) -> Result<impl Future<Output = RunStatistics> + Send, ConfigError> {
    let client = Arc::new(ToyClient::new(config)?);

    let scenario = Scenario::new("toystore", move || {
        let client = client.clone();
        async move { toy_iteration(&client).await }
    })
    .vus(config.vus)
    .iterations(config.iterations)
    .max_duration(config.max_duration)
    .thresholds(toystore_thresholds()?);

    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Cli;
    use std::num::NonZeroUsize;
    use std::time::Duration;

    fn config(gateway: &str) -> ToystoreConfig {
        ToystoreConfig::from_cli(Cli {
            token: Some("abc".to_string()),
            gateway_url: Some(gateway.to_string()),
            vus: NonZeroUsize::new(2).unwrap(),
            iterations: 4,
            request_timeout: Some(Duration::from_millis(500).into()),
            max_duration: Duration::from_secs(30).into(),
        })
        .unwrap()
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn unreachable_gateway_records_failures() {
        // Port 9 (discard) on loopback is closed in any test environment worth running in.
        let stats = toystore_scenario(&config("127.0.0.1:9")).unwrap().await;

        assert_eq!(stats.iterations, 4);
        assert_eq!(stats.rate(SUCCESS_RATE), Some(0.));
        assert_eq!(stats.rate(gateload::core::HTTP_REQ_FAILED), Some(1.));
        assert!(!stats.passed());
    }
}
