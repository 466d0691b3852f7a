use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use mock_service::{MockConfig, MockGateway};
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::OnceLock;
use std::time::Duration;
use toystore_load::{Cli, ToystoreConfig};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

/// Install logging and the Prometheus recorder once per test binary.
#[allow(unused)]
pub fn init() -> &'static PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

    HANDLE.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("gateload=debug,toystore_load=debug,mock_service=info")
            .with_test_writer()
            .try_init();

        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(err) => panic!("Failed to install Prometheus recorder: {err}"),
        }
    })
}

#[allow(unused)]
pub async fn mock_gateway(config: MockConfig) -> (MockGateway, SocketAddr) {
    init();
    let gateway = MockGateway::new(config);
    let addr = mock_service::spawn(gateway.clone())
        .await
        .expect("mock gateway failed to bind");
    (gateway, addr)
}

#[allow(unused)]
pub fn toystore_config(addr: SocketAddr, vus: usize, iterations: u64) -> ToystoreConfig {
    ToystoreConfig::from_cli(Cli {
        token: Some("abc".to_string()),
        gateway_url: Some(addr.to_string()),
        vus: NonZeroUsize::new(vus).expect("vus must be positive"),
        iterations,
        request_timeout: Some(Duration::from_secs(5).into()),
        max_duration: Duration::from_secs(120).into(),
    })
    .expect("valid config")
}
