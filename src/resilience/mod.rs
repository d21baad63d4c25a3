//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream operation:
//!     → cache.rs (serve a live entry without touching the upstream)
//!     → circuit_breaker.rs (short-circuit to fallback while open)
//!     → retries.rs (re-run retryable failures with backoff.rs delays)
//!     → timeouts.rs (bound every attempt with a deadline)
//!     → outcome recorded on the circuit permit, success stored in the cache
//! ```
//!
//! # Design Decisions
//! - Every policy is per operation; nothing is shared between operations but the registry
//! - Not-found is a valid answer: never retried, never counted as a failure
//! - A circuit sees one outcome per logical call, not one per attempt

pub mod backoff;
pub mod cache;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::Backoff;
pub use cache::{CacheStatus, ResponseCache};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerRegistry, CircuitPermit, CircuitSnapshot, CircuitStatus,
};
pub use retries::RetryExecutor;
