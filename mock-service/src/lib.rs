//! Stand-in for a Kuadrant gateway fronting the toystore API.
//!
//! Serves `GET /toy` for the `api.toystore.com` virtual host, requires a bearer token, and
//! records every request it sees so tests can assert on what the load generator sent.
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    routing::get,
    Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::net::SocketAddr;
use std::num::{NonZeroU32, NonZeroU64};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

pub const TOYSTORE_HOST: &str = "api.toystore.com";

#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Answer every Nth request with `503 Service Unavailable`.
    pub fail_every: Option<NonZeroU64>,
    /// Delay before answering each request.
    pub delay: Duration,
    /// Answer `429 Too Many Requests` above this rate.
    pub max_tps: Option<NonZeroU32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub path: String,
    pub host: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Clone)]
pub struct MockGateway {
    inner: Arc<Inner>,
}

struct Inner {
    config: MockConfig,
    limiter: Option<DefaultDirectRateLimiter>,
    hits: AtomicU64,
    seen: Mutex<Vec<SeenRequest>>,
}

impl MockGateway {
    pub fn new(config: MockConfig) -> Self {
        let limiter = config
            .max_tps
            .map(|tps| RateLimiter::direct(Quota::per_second(tps)));
        Self {
            inner: Arc::new(Inner {
                config,
                limiter,
                hits: AtomicU64::new(0),
                seen: Mutex::new(vec![]),
            }),
        }
    }

    /// Total requests received on any path.
    pub fn hits(&self) -> u64 {
        self.inner.hits.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.inner
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, uri: &Uri, headers: &HeaderMap) -> (u64, SeenRequest) {
        let value_of = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        let seen = SeenRequest {
            path: uri.path().to_string(),
            host: value_of(header::HOST),
            authorization: value_of(header::AUTHORIZATION),
        };

        self.inner
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(seen.clone());
        (self.inner.hits.fetch_add(1, Ordering::Relaxed), seen)
    }
}

pub fn router(gateway: MockGateway) -> Router {
    Router::new()
        .route("/toy", get(toy))
        .fallback(unknown)
        .with_state(gateway)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(listener: TcpListener, gateway: MockGateway) -> std::io::Result<()> {
    axum::serve(listener, router(gateway)).await
}

/// Serve on an ephemeral loopback port in the background.
pub async fn spawn(gateway: MockGateway) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = run(listener, gateway).await {
            error!("Mock gateway stopped: {err}");
        }
    });
    Ok(addr)
}

async fn toy(
    State(gateway): State<MockGateway>,
    uri: Uri,
    headers: HeaderMap,
) -> (StatusCode, &'static str) {
    let (n, seen) = gateway.record(&uri, &headers);
    let config = &gateway.inner.config;

    if !config.delay.is_zero() {
        tokio::time::sleep(config.delay).await;
    }

    if let Some(limiter) = &gateway.inner.limiter {
        if limiter.check().is_err() {
            return (StatusCode::TOO_MANY_REQUESTS, "rate limited");
        }
    }

    if config.fail_every.is_some_and(|every| (n + 1) % every.get() == 0) {
        debug!("Failing request {n}");
        return (StatusCode::SERVICE_UNAVAILABLE, "unavailable");
    }

    if seen.host.as_deref() != Some(TOYSTORE_HOST) {
        return (StatusCode::NOT_FOUND, "no route for host");
    }

    match seen.authorization.as_deref().and_then(|v| v.strip_prefix("Bearer ")) {
        Some(token) if !token.is_empty() => (StatusCode::OK, r#"[{"name":"robot"}]"#),
        _ => (StatusCode::UNAUTHORIZED, "missing bearer token"),
    }
}

async fn unknown(
    State(gateway): State<MockGateway>,
    uri: Uri,
    headers: HeaderMap,
) -> StatusCode {
    gateway.record(&uri, &headers);
    StatusCode::NOT_FOUND
}
