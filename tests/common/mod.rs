//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use similar_products::config::{BackoffStrategy, ServiceConfig};
use similar_products::domain::{ProductDetail, ProductId, RelatedIdSet, UpstreamError};
use similar_products::lifecycle::Shutdown;
use similar_products::resilience::CircuitBreakerRegistry;
use similar_products::upstream::{ProductApi, ResilientProductClient};
use similar_products::{HttpServer, SimilarProductsAggregator};

pub fn id(raw: &str) -> ProductId {
    ProductId::parse(raw).unwrap()
}

pub fn product(raw_id: &str, name: &str, price: &str, availability: bool) -> ProductDetail {
    ProductDetail::new(id(raw_id), name, BigDecimal::from_str(price).unwrap(), availability)
}

pub fn prod_2() -> ProductDetail {
    product("2", "Prod 2", "12.34", true)
}

pub fn prod_3() -> ProductDetail {
    product("3", "Prod 3", "99.99", false)
}

/// Defaults with retries that wait only a millisecond.
pub fn fast_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    for op in [
        &mut config.resilience.similar_ids,
        &mut config.resilience.product_detail,
    ] {
        op.retry.backoff = BackoffStrategy::Fixed;
        op.retry.base_delay_ms = 1;
        op.retry.max_delay_ms = 1;
        op.retry.jitter = false;
    }
    config
}

// ---------------------------------------------------------------------------
// In-memory catalog
// ---------------------------------------------------------------------------

/// Programmable `ProductApi` with call counters. Unknown ids are not found.
#[derive(Default)]
pub struct FakeCatalog {
    related: Mutex<HashMap<String, Result<RelatedIdSet, UpstreamError>>>,
    details: Mutex<HashMap<String, Result<ProductDetail, UpstreamError>>>,
    similar_calls: AtomicU32,
    detail_calls: AtomicU32,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_related(self, root: &str, ids: &[&str]) -> Self {
        let ids = ids.iter().map(|raw| id(raw)).collect();
        self.related.lock().unwrap().insert(root.to_string(), Ok(ids));
        self
    }

    pub fn with_related_error(self, root: &str, err: UpstreamError) -> Self {
        self.related.lock().unwrap().insert(root.to_string(), Err(err));
        self
    }

    pub fn with_detail(self, detail: ProductDetail) -> Self {
        self.details
            .lock()
            .unwrap()
            .insert(detail.id.as_str().to_string(), Ok(detail));
        self
    }

    /// Serve `detail` when asked for `raw_id`, whatever its own id says.
    pub fn with_detail_as(self, raw_id: &str, detail: ProductDetail) -> Self {
        self.details.lock().unwrap().insert(raw_id.to_string(), Ok(detail));
        self
    }

    pub fn with_detail_error(self, raw_id: &str, err: UpstreamError) -> Self {
        self.details.lock().unwrap().insert(raw_id.to_string(), Err(err));
        self
    }

    /// Replace what `detail.id` answers with after construction.
    pub fn set_detail(&self, detail: ProductDetail) {
        self.details
            .lock()
            .unwrap()
            .insert(detail.id.as_str().to_string(), Ok(detail));
    }

    pub fn similar_calls(&self) -> u32 {
        self.similar_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> u32 {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductApi for FakeCatalog {
    async fn similar_ids(&self, root: &ProductId) -> Result<RelatedIdSet, UpstreamError> {
        self.similar_calls.fetch_add(1, Ordering::SeqCst);
        self.related
            .lock()
            .unwrap()
            .get(root.as_str())
            .cloned()
            .unwrap_or_else(|| Err(UpstreamError::NotFound { id: root.clone() }))
    }

    async fn product_detail(&self, raw_id: &ProductId) -> Result<ProductDetail, UpstreamError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.details
            .lock()
            .unwrap()
            .get(raw_id.as_str())
            .cloned()
            .unwrap_or_else(|| Err(UpstreamError::NotFound { id: raw_id.clone() }))
    }
}

/// An aggregator wired over a `FakeCatalog`, with its circuits exposed.
pub struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub registry: CircuitBreakerRegistry,
    pub aggregator: SimilarProductsAggregator,
}

pub fn harness(catalog: FakeCatalog, config: ServiceConfig) -> Harness {
    let catalog = Arc::new(catalog);
    let registry = CircuitBreakerRegistry::default();
    let client = ResilientProductClient::new(catalog.clone(), &config, &registry);
    let aggregator = SimilarProductsAggregator::new(Arc::new(client), &config.aggregation);
    Harness {
        catalog,
        registry,
        aggregator,
    }
}

// ---------------------------------------------------------------------------
// TCP mock catalog
// ---------------------------------------------------------------------------

/// A catalog served over real HTTP on an ephemeral port.
pub struct MockCatalog {
    pub addr: SocketAddr,
    hits: Arc<Mutex<HashMap<String, u32>>>,
}

impl MockCatalog {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// How many requests hit `path`.
    pub fn hits(&self, path: &str) -> u32 {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

/// Start a mock catalog; `handler` maps a request path to `(status, body)`.
pub async fn start_mock_catalog<F>(handler: F) -> MockCatalog
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits: Arc<Mutex<HashMap<String, u32>>> = Arc::default();
    let handler = Arc::new(handler);

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let Some(path) = read_request_path(&mut socket).await else {
                            return;
                        };
                        *counter.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

                        let (status, body) = handler(&path);
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_line(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockCatalog { addr, hits }
}

async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    head.lines()
        .next()?
        .split_whitespace()
        .nth(1)
        .map(str::to_string)
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        400 => "400 Bad Request",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "500 Internal Server Error",
    }
}

/// The catalog used by the end-to-end scenarios.
///
/// Root "1" relates to "2" and "3"; root "999" is unknown.
pub fn scenario_routes(path: &str) -> (u16, String) {
    match path {
        "/product/1/similarids" => (200, "[2,3]".into()),
        "/product/2" => (
            200,
            r#"{"id":"2","name":"Prod 2","price":12.34,"availability":true}"#.into(),
        ),
        "/product/3" => (
            200,
            r#"{"id":"3","name":"Prod 3","price":99.99,"availability":false}"#.into(),
        ),
        _ => (404, r#"{"message":"Product not found"}"#.into()),
    }
}

// ---------------------------------------------------------------------------
// Service under test
// ---------------------------------------------------------------------------

pub struct RunningService {
    pub addr: SocketAddr,
    pub shutdown: Arc<Shutdown>,
    pub handle: JoinHandle<()>,
}

impl RunningService {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Serve `config` on an ephemeral port.
pub async fn start_service(config: ServiceConfig) -> RunningService {
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Arc::new(Shutdown::new());
    let signal = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });

    RunningService {
        addr,
        shutdown,
        handle,
    }
}
