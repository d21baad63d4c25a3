//! Upstream product catalog access.
//!
//! # Responsibilities
//! - Define the raw catalog port (`ProductApi`)
//! - Provide the HTTP adapter that speaks the catalog's REST contract
//! - Wrap both raw operations in the resilience chain
//!
//! # Data Flow
//! ```text
//! aggregation
//!     → resilient.rs (cache → circuit → retry → fallback, per operation)
//!     → ProductApi (http.rs in production, in-memory fakes in tests)
//!     → catalog: GET /product/{id}/similarids, GET /product/{id}
//! ```
//!
//! # Design Decisions
//! - Raw operations return already-classified `UpstreamError`s; nothing
//!   above this module sees reqwest types
//! - Every value leaving the resilient client says where it came from,
//!   so fallbacks are never confused with genuine empty answers

pub mod http;
pub mod resilient;

use async_trait::async_trait;

use crate::domain::{ErrorKind, ProductDetail, ProductId, RelatedIdSet, UpstreamError};

pub use http::HttpProductApi;
pub use resilient::{ResilientOperation, ResilientProductClient};

/// Operation name for related-id lookups: circuit, cache namespace and metric label.
pub const SIMILAR_IDS: &str = "similar_ids";

/// Operation name for detail lookups: circuit, cache namespace and metric label.
pub const PRODUCT_DETAIL: &str = "product_detail";

/// The two raw catalog calls, without any resilience applied.
#[async_trait]
pub trait ProductApi: Send + Sync {
    /// Identifiers of products related to `id`.
    async fn similar_ids(&self, id: &ProductId) -> Result<RelatedIdSet, UpstreamError>;

    /// Detail of a single product.
    async fn product_detail(&self, id: &ProductId) -> Result<ProductDetail, UpstreamError>;
}

/// Why a fallback value was returned instead of an upstream answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    CircuitOpen,
    Error(ErrorKind),
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReason::CircuitOpen => "circuit_open",
            FallbackReason::Error(kind) => kind.as_str(),
        }
    }
}

/// Origin of a value returned by the resilient client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Upstream,
    Cache,
    Fallback(FallbackReason),
}

impl Source {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Source::Fallback(_))
    }
}

/// A value together with the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Fetched<T> {
    pub fn new(value: T, source: Source) -> Self {
        Self { value, source }
    }
}
