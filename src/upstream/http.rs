//! HTTP adapter for the product catalog.
//!
//! # Responsibilities
//! - Build catalog URLs with percent-encoded path segments
//! - Bound each request with the configured connect and read timeouts
//! - Classify every failure into an `UpstreamError` at this boundary

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;
use crate::domain::{ProductDetail, ProductId, RelatedIdSet, UpstreamError};
use crate::upstream::ProductApi;

/// Upper bound on how much of an error body ends up in a message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid upstream base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("upstream base url cannot carry a path: {0}")]
    NotABase(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Catalog client over reqwest.
#[derive(Debug, Clone)]
pub struct HttpProductApi {
    client: Client,
    base_url: Url,
}

impl HttpProductApi {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ClientBuildError> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientBuildError::NotABase(config.base_url.clone()));
        }

        // Whole-request deadline; bounds the read phase of one attempt.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, id: &ProductId, suffix: Option<&str>) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| UpstreamError::unexpected("base url cannot be a base"))?;
            segments.pop_if_empty().push("product").push(id.as_str());
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        Ok(url)
    }

    async fn get_body(&self, url: Url, id: &ProductId) -> Result<Vec<u8>, UpstreamError> {
        tracing::debug!(url = %url, "Calling catalog");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, id, &body));
        }

        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| classify_transport(&e))
    }
}

#[async_trait]
impl ProductApi for HttpProductApi {
    async fn similar_ids(&self, id: &ProductId) -> Result<RelatedIdSet, UpstreamError> {
        let url = self.endpoint(id, Some("similarids"))?;
        let body = self.get_body(url, id).await?;
        parse_related_ids(id, &body)
    }

    async fn product_detail(&self, id: &ProductId) -> Result<ProductDetail, UpstreamError> {
        let url = self.endpoint(id, None)?;
        let body = self.get_body(url, id).await?;
        parse_detail(&body)
    }
}

/// Parse a JSON array of string or integer ids. Unusable entries are skipped.
pub fn parse_related_ids(root: &ProductId, body: &[u8]) -> Result<RelatedIdSet, UpstreamError> {
    let raw: Vec<serde_json::Value> = serde_json::from_slice(body)
        .map_err(|e| UpstreamError::unexpected(format!("malformed related ids payload: {e}")))?;

    let mut ids = RelatedIdSet::new();
    for value in &raw {
        match ProductId::from_json(value) {
            Ok(id) => {
                ids.insert(id);
            }
            Err(e) => tracing::warn!(root = %root, value = %value, error = %e, "Dropping unusable related id"),
        }
    }
    Ok(ids)
}

pub fn parse_detail(body: &[u8]) -> Result<ProductDetail, UpstreamError> {
    let detail: ProductDetail = serde_json::from_slice(body)
        .map_err(|e| UpstreamError::unexpected(format!("malformed product payload: {e}")))?;
    detail.validate().map_err(UpstreamError::unexpected)?;
    Ok(detail)
}

/// Map a non-success status to an error classification.
pub fn classify_status(status: StatusCode, id: &ProductId, body: &str) -> UpstreamError {
    if status == StatusCode::NOT_FOUND {
        UpstreamError::NotFound { id: id.clone() }
    } else if status == StatusCode::REQUEST_TIMEOUT {
        UpstreamError::transient(format!("status 408: {}", truncate_body(body)))
    } else if status.is_client_error() {
        UpstreamError::Client {
            status: status.as_u16(),
            message: truncate_body(body),
        }
    } else if status.is_server_error() {
        UpstreamError::transient(format!("status {}: {}", status.as_u16(), truncate_body(body)))
    } else {
        UpstreamError::unexpected(format!(
            "unexpected status {}: {}",
            status.as_u16(),
            truncate_body(body)
        ))
    }
}

/// Map a transport-level failure to an error classification.
pub fn classify_transport(err: &reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::transient(format!("timed out: {err}"))
    } else if err.is_connect() {
        UpstreamError::transient(format!("connection failed: {err}"))
    } else {
        UpstreamError::unexpected(err.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
