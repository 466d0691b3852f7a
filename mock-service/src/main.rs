use clap::Parser;
use mock_service::{MockConfig, MockGateway};
use std::net::SocketAddr;
use std::num::{NonZeroU32, NonZeroU64};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(version, about = "Mock toystore gateway for local load tests.")]
struct MockCli {
    #[arg(short, long, default_value_t = 3002)]
    port: u16,

    /// Answer every Nth request with 503.
    #[arg(long)]
    fail_every: Option<NonZeroU64>,

    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Answer 429 above this many requests per second.
    #[arg(long)]
    max_tps: Option<NonZeroU32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=info,tower_http=info")),
        )
        .init();

    let args = MockCli::parse();
    let gateway = MockGateway::new(MockConfig {
        fail_every: args.fail_every,
        delay: Duration::from_millis(args.delay_ms),
        max_tps: args.max_tps,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Mock gateway listening on {addr}");
    mock_service::run(listener, gateway).await?;
    Ok(())
}
