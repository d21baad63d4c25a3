//! Error responses for the public endpoint.
//!
//! Failures are rendered as problem-detail documents
//! (`application/problem+json`) whose title is the application error code.
//!
//! | Condition                          | Code                 | Status |
//! |------------------------------------|----------------------|--------|
//! | root id empty or malformed         | `INVALID_INPUT`      | 400    |
//! | root product unknown to catalog    | `NOT_FOUND`          | 404    |
//! | no route matches the path          | `NOT_FOUND`          | 404    |
//! | route exists, method does not      | `METHOD_NOT_ALLOWED` | 405    |
//! | catalog rejected or unavailable    | `UPSTREAM_FAILURE`   | 502    |
//! | anything unclassified              | `UNEXPECTED_ERROR`   | 500    |
//!
//! Every document also carries the request `path` and a `timestamp`.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AggregationError, ErrorKind};
use crate::http::request::RequestId;

pub const PROBLEM_JSON: &str = "application/problem+json";

/// Application error code exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    MethodNotAllowed,
    UpstreamFailure,
    UnexpectedError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorCode::UpstreamFailure => "UPSTREAM_FAILURE",
            ErrorCode::UnexpectedError => "UNEXPECTED_ERROR",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::UpstreamFailure => StatusCode::BAD_GATEWAY,
            ErrorCode::UnexpectedError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&AggregationError> for ErrorCode {
    fn from(err: &AggregationError) -> Self {
        match err {
            AggregationError::InvalidInput(_) => ErrorCode::InvalidInput,
            AggregationError::Upstream(upstream) => match upstream.kind() {
                ErrorKind::NotFound => ErrorCode::NotFound,
                ErrorKind::Client | ErrorKind::Transient => ErrorCode::UpstreamFailure,
                ErrorKind::Unexpected => ErrorCode::UnexpectedError,
            },
        }
    }
}

/// Wire shape of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    pub code: String,
    pub path: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// A failed request, ready to be rendered.
#[derive(Debug, Clone)]
pub struct ApiError {
    code: ErrorCode,
    detail: String,
    instance: String,
    request_id: Option<RequestId>,
    occurred_at: DateTime<Utc>,
}

impl ApiError {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
            instance: String::new(),
            request_id: None,
            occurred_at: Utc::now(),
        }
    }

    /// Path of the request that failed.
    pub fn at(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn problem(&self) -> ProblemDetail {
        ProblemDetail {
            problem_type: "about:blank".to_string(),
            title: self.code.as_str().to_string(),
            status: self.code.status().as_u16(),
            detail: self.detail.clone(),
            instance: self.instance.clone(),
            code: self.code.as_str().to_string(),
            path: self.instance.clone(),
            timestamp: self.occurred_at,
            request_id: self.request_id.as_ref().map(|id| id.to_string()),
        }
    }
}

impl From<AggregationError> for ApiError {
    fn from(err: AggregationError) -> Self {
        let code = ErrorCode::from(&err);
        let detail = match code {
            ErrorCode::UnexpectedError => "unexpected upstream failure".to_string(),
            _ => err.to_string(),
        };
        Self::new(code, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        let request_id = self.request_id.as_ref().map(|id| id.as_str()).unwrap_or("unknown");
        if status.is_server_error() {
            tracing::error!(request_id, code = self.code.as_str(), detail = %self.detail, "Request failed");
        } else {
            tracing::info!(request_id, code = self.code.as_str(), detail = %self.detail, "Request rejected");
        }

        (status, [(header::CONTENT_TYPE, PROBLEM_JSON)], Json(self.problem())).into_response()
    }
}
