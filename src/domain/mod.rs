//! Domain values shared by every subsystem.
//!
//! # Data Flow
//! ```text
//! path parameter (&str)
//!     → ProductId::parse (trim, reject empty)
//!     → upstream returns RelatedIdSet / ProductDetail
//!     → aggregation collects HashSet<ProductDetail>
//! ```
//!
//! # Design Decisions
//! - Ids are validated once at construction; everything downstream trusts them
//! - Detail identity is the id alone, so sets deduplicate by id
//! - Error classification lives on the error tag, not on transport types

pub mod error;
pub mod product;

pub use error::{AggregationError, ErrorKind, InvalidProductId, UpstreamError};
pub use product::{ProductDetail, ProductId, RelatedIdSet};
