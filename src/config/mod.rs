//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → handed to HttpServer, which builds the shared components once
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AggregationConfig, BackoffStrategy, CacheConfig, CircuitBreakerConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, OperationConfig, ResilienceConfig, RetryConfig, ServiceConfig,
    UpstreamConfig,
};
