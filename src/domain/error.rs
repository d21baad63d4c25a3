//! Error taxonomy for upstream calls and aggregation.

use thiserror::Error;

use crate::domain::product::{ProductId, MAX_ID_LEN};

/// Rejected product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidProductId {
    #[error("product id must not be empty")]
    Empty,

    #[error("product id is {0} bytes, limit is {max}", max = MAX_ID_LEN)]
    TooLong(usize),

    #[error("product id must be a string or an integer")]
    NotScalar,
}

/// Classification tag of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Valid negative answer from the catalog.
    NotFound,
    /// 4xx other than not-found.
    Client,
    /// 5xx, timeout or connection failure.
    Transient,
    /// Anything uncategorized; handled like `Transient`.
    Unexpected,
}

impl ErrorKind {
    /// Whether another attempt may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::Unexpected)
    }

    /// Whether the outcome is an outage signal for the circuit breaker.
    pub fn counts_as_failure(self) -> bool {
        !matches!(self, ErrorKind::NotFound)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Client => "client_error",
            ErrorKind::Transient => "transient",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

/// Failure of a raw catalog call, already classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("product {id} not found upstream")]
    NotFound { id: ProductId },

    #[error("upstream rejected request with status {status}: {message}")]
    Client { status: u16, message: String },

    #[error("transient upstream failure: {reason}")]
    Transient { reason: String },

    #[error("unexpected upstream failure: {reason}")]
    Unexpected { reason: String },
}

impl UpstreamError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    pub fn unexpected(reason: impl Into<String>) -> Self {
        Self::Unexpected {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            UpstreamError::NotFound { .. } => ErrorKind::NotFound,
            UpstreamError::Client { .. } => ErrorKind::Client,
            UpstreamError::Transient { .. } => ErrorKind::Transient,
            UpstreamError::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn counts_as_failure(&self) -> bool {
        self.kind().counts_as_failure()
    }
}

/// Errors surfaced by `find_similar_products`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidProductId),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
