//! Similar-products aggregation.
//!
//! # Data Flow
//! ```text
//! root id (caller input)
//!     → ProductId::parse (InvalidInput before any network activity)
//!     → fetch_related_ids (errors propagate unchanged)
//!     → fetch_detail per related id, bounded concurrency
//!     → absent or failed details are excluded and logged
//!     → HashSet<ProductDetail> (deduplicated by id)
//! ```

pub mod orchestrator;

pub use orchestrator::SimilarProductsAggregator;
