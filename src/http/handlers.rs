//! Route handlers.

use axum::extract::{Path, State};
use axum::http::{Method, Uri};
use axum::Json;
use serde::Serialize;

use crate::domain::ProductDetail;
use crate::http::error::{ApiError, ErrorCode};
use crate::http::request::RequestId;
use crate::http::server::AppState;
use crate::resilience::{CircuitSnapshot, CircuitStatus};

/// `GET /product/{id}/similar`
pub async fn similar_products(
    State(state): State<AppState>,
    Path(id): Path<String>,
    uri: Uri,
    request_id: RequestId,
) -> Result<Json<Vec<ProductDetail>>, ApiError> {
    tracing::debug!(request_id = %request_id, id = %id, "Listing similar products");

    let details = state
        .aggregator
        .find_similar_products(&id)
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()).with_request_id(request_id))?;

    let mut details: Vec<ProductDetail> = details.into_iter().collect();
    details.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Json(details))
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub circuits: Vec<CircuitSnapshot>,
}

/// `GET /health`
///
/// Reports `degraded` while any circuit is not closed. Always 200: the
/// service keeps answering with fallbacks.
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let circuits = state.circuits.snapshots();
    let degraded = circuits.iter().any(|c| c.status != CircuitStatus::Closed);
    Json(HealthReport {
        status: if degraded { "degraded" } else { "ok" },
        circuits,
    })
}

/// Fallback for paths no route matches.
pub async fn route_not_found(uri: Uri, request_id: RequestId) -> ApiError {
    ApiError::new(ErrorCode::NotFound, format!("no route for {}", uri.path()))
        .at(uri.path())
        .with_request_id(request_id)
}

/// Fallback for a known path requested with an unsupported method.
pub async fn method_not_allowed(method: Method, uri: Uri, request_id: RequestId) -> ApiError {
    ApiError::new(
        ErrorCode::MethodNotAllowed,
        format!("method {method} is not supported for {}", uri.path()),
    )
    .at(uri.path())
    .with_request_id(request_id)
}
