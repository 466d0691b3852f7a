mod utils;
use utils::*;

use gateload::core::{HTTP_REQS, HTTP_REQ_FAILED};
use mock_service::{MockConfig, TOYSTORE_HOST};
use std::num::{NonZeroU32, NonZeroU64};
use toystore_load::config::SUCCESS_RATE;
use toystore_load::{toystore_scenario, Cli, ConfigError, ToystoreConfig};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn default_run_hits_toy_endpoint_exactly_iterations_times() {
    let (gateway, addr) = mock_gateway(MockConfig::default()).await;

    let config = toystore_config(addr, 10, 1000);
    assert_eq!(config.target.url().as_str(), format!("http://{addr}/toy"));

    let stats = toystore_scenario(&config).unwrap().await;

    assert_eq!(gateway.hits(), 1000);
    assert_eq!(stats.iterations, 1000);
    assert_eq!(stats.count(HTTP_REQS), Some(1000));
    assert_eq!(stats.vus, 10);

    for seen in gateway.requests() {
        assert_eq!(seen.path, "/toy");
        assert_eq!(seen.host.as_deref(), Some(TOYSTORE_HOST));
        assert_eq!(seen.authorization.as_deref(), Some("Bearer abc"));
    }

    assert_eq!(stats.rate(SUCCESS_RATE), Some(1.0));
    assert_eq!(stats.rate(HTTP_REQ_FAILED), Some(0.0));
    assert!(stats.passed(), "{stats}");
}

#[tokio::test]
async fn single_vu_single_iteration_sends_one_request() {
    let (gateway, addr) = mock_gateway(MockConfig::default()).await;

    let stats = toystore_scenario(&toystore_config(addr, 1, 1))
        .unwrap()
        .await;

    assert_eq!(gateway.hits(), 1);
    assert_eq!(stats.iterations, 1);
    assert_eq!(stats.vus, 1);
    assert!(stats.passed(), "{stats}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn twenty_percent_errors_fail_the_success_rate_threshold() {
    let (gateway, addr) = mock_gateway(MockConfig {
        fail_every: NonZeroU64::new(5),
        ..Default::default()
    })
    .await;

    let stats = toystore_scenario(&toystore_config(addr, 10, 1000))
        .unwrap()
        .await;

    assert_eq!(gateway.hits(), 1000);
    assert_eq!(stats.rate(SUCCESS_RATE), Some(0.8));
    assert_eq!(stats.rate(HTTP_REQ_FAILED), Some(0.2));
    assert!(!stats.passed());

    let crossed: Vec<_> = stats
        .failed_thresholds()
        .map(|t| t.metric.as_str())
        .collect();
    assert_eq!(crossed, [HTTP_REQ_FAILED, SUCCESS_RATE]);
}

#[tokio::test]
async fn rate_limited_gateway_counts_as_failures() {
    let (_gateway, addr) = mock_gateway(MockConfig {
        max_tps: NonZeroU32::new(1),
        ..Default::default()
    })
    .await;

    let stats = toystore_scenario(&toystore_config(addr, 4, 20))
        .unwrap()
        .await;

    assert_eq!(stats.iterations, 20);
    assert!(stats.rate(SUCCESS_RATE).unwrap() < 0.5, "{stats}");
    assert!(!stats.passed());
}

#[tokio::test]
async fn missing_required_settings_abort_before_any_request() {
    let (gateway, addr) = mock_gateway(MockConfig::default()).await;

    let without_token = Cli {
        token: None,
        gateway_url: Some(addr.to_string()),
        ..cli_defaults()
    };
    let err = ToystoreConfig::from_cli(without_token).unwrap_err();
    assert!(matches!(err, ConfigError::Missing("TOKEN")));

    let without_gateway = Cli {
        token: Some("abc".to_string()),
        gateway_url: None,
        ..cli_defaults()
    };
    let err = ToystoreConfig::from_cli(without_gateway).unwrap_err();
    assert!(matches!(err, ConfigError::Missing("KUADRANT_GATEWAY_URL")));

    assert_eq!(gateway.hits(), 0);
}

#[tokio::test]
async fn transactions_are_exported_to_metrics() {
    let handle = init();
    let (_gateway, addr) = mock_gateway(MockConfig::default()).await;

    toystore_scenario(&toystore_config(addr, 2, 10))
        .unwrap()
        .await;

    let rendered = handle.render();
    assert!(rendered.contains("get_toy_latency"), "{rendered}");
    assert!(rendered.contains("get_toy_success"), "{rendered}");
    assert!(rendered.contains(SUCCESS_RATE), "{rendered}");
}

fn cli_defaults() -> Cli {
    Cli {
        token: None,
        gateway_url: None,
        vus: gateload::core::DEFAULT_VUS,
        iterations: gateload::core::DEFAULT_ITERATIONS,
        request_timeout: None,
        max_duration: gateload::core::DEFAULT_MAX_DURATION.into(),
    }
}
