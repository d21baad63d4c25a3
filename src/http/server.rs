//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared components once (catalog client, circuits, aggregator)
//! - Create the Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, metrics)
//! - Serve until the shutdown signal fires

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::aggregation::SimilarProductsAggregator;
use crate::config::ServiceConfig;
use crate::http::handlers;
use crate::http::request::RequestId;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::CircuitBreakerRegistry;
use crate::upstream::http::ClientBuildError;
use crate::upstream::{HttpProductApi, ProductApi, ResilientProductClient};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<SimilarProductsAggregator>,
    pub circuits: Arc<CircuitBreakerRegistry>,
}

/// HTTP server for the similar-products endpoint.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a server talking to the catalog configured in `config.upstream`.
    pub fn new(config: ServiceConfig) -> Result<Self, ClientBuildError> {
        let api = HttpProductApi::new(&config.upstream)?;
        tracing::info!(base_url = %api.base_url(), "Catalog client ready");
        Ok(Self::with_api(config, Arc::new(api)))
    }

    /// Create a server over any catalog implementation.
    pub fn with_api(config: ServiceConfig, api: Arc<dyn ProductApi>) -> Self {
        let circuits = Arc::new(CircuitBreakerRegistry::default());
        let client = Arc::new(ResilientProductClient::new(api, &config, &circuits));
        let aggregator = Arc::new(SimilarProductsAggregator::new(client, &config.aggregation));

        let state = AppState {
            aggregator,
            circuits,
        };
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        Router::new()
            .route("/product/{id}/similar", get(handlers::similar_products))
            .route("/health", get(handlers::health))
            .fallback(handlers::route_not_found)
            .method_not_allowed_fallback(handlers::method_not_allowed)
            .with_state(state)
            .layer(middleware::from_fn(track_metrics))
            .layer(TimeoutLayer::new(config.listener.request_timeout()))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Span for one inbound request, tagged with the id set by the outer layer.
fn request_span(request: &Request) -> tracing::Span {
    let request_id = RequestId::from_headers(request.headers());
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    metrics::record_request(response.status().as_u16(), start);
    response
}
