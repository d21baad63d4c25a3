//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the similar-products service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, request deadline).
    pub listener: ListenerConfig,

    /// Upstream catalog connection settings.
    pub upstream: UpstreamConfig,

    /// Per-operation resilience policies.
    pub resilience: ResilienceConfig,

    /// Fan-out settings.
    pub aggregation: AggregationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Total time allowed for one inbound request in seconds.
    pub request_timeout_secs: u64,
}

impl ListenerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Upstream catalog configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the product catalog (e.g., "http://localhost:3001").
    pub base_url: String,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Read timeout per attempt in milliseconds.
    pub read_timeout_ms: u64,
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            connect_timeout_ms: 2000,
            read_timeout_ms: 3000,
        }
    }
}

/// Resilience policies, one block per upstream operation.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Related-id lookups for a root product.
    pub similar_ids: OperationConfig,

    /// Detail lookups for a single product.
    pub product_detail: OperationConfig,
}

impl ResilienceConfig {
    /// Root lookups propagate terminal errors unless told otherwise.
    pub fn similar_ids_fallback_on_error(&self) -> bool {
        self.similar_ids.fallback_on_error.unwrap_or(false)
    }

    /// Detail lookups resolve terminal errors to an absent value by default.
    pub fn product_detail_fallback_on_error(&self) -> bool {
        self.product_detail.fallback_on_error.unwrap_or(true)
    }
}

/// Cache, circuit breaker and retry settings for one operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OperationConfig {
    pub circuit_breaker: CircuitBreakerConfig,

    pub retry: RetryConfig,

    pub cache: CacheConfig,

    /// Resolve terminal errors to the operation's fallback value instead of
    /// propagating them. An open circuit always resolves to the fallback.
    /// Unset means the per-operation default (see `ResilienceConfig`).
    pub fallback_on_error: Option<bool>,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            fallback_on_error: None,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure ratio (0.0, 1.0] at or above which the circuit opens.
    pub failure_rate_threshold: f64,

    /// Calls required in the window before the ratio is evaluated.
    pub minimum_calls: u32,

    /// Length of the rolling counting window in seconds.
    pub window_secs: u64,

    /// Time the circuit stays open before allowing trials, in milliseconds.
    pub open_cooldown_ms: u64,

    /// Trial calls permitted concurrently while half-open.
    pub half_open_trials: u32,
}

impl CircuitBreakerConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn open_cooldown(&self) -> Duration {
        Duration::from_millis(self.open_cooldown_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            minimum_calls: 10,
            window_secs: 60,
            open_cooldown_ms: 10_000,
            half_open_trials: 1,
        }
    }
}

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    Exponential,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Backoff strategy.
    pub backoff: BackoffStrategy,

    /// Base delay in milliseconds (the fixed delay for `fixed`).
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Spread every delay randomly by up to 10% either way.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            jitter: true,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in seconds. Zero disables caching.
    pub ttl_secs: u64,

    /// Upper bound on stored entries.
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60,
            max_entries: 10_000,
        }
    }
}

/// Fan-out configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Detail lookups in flight per request. 1 means sequential.
    pub max_concurrency: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self { max_concurrency: 8 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level directive used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
