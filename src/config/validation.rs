//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ratios in (0, 1], counts >= 1)
//! - Check the upstream base URL and bind address parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{OperationConfig, ServiceConfig};

/// A single semantic problem, tagged with the offending key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    match url::Url::parse(&config.upstream.base_url) {
        Ok(url) if url.cannot_be_a_base() => errors.push(ValidationError::new(
            "upstream.base_url",
            "must be a base URL",
        )),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("'{}': {}", config.upstream.base_url, e),
        )),
    }
    if config.upstream.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("upstream.connect_timeout_ms", "must be > 0"));
    }
    if config.upstream.read_timeout_ms == 0 {
        errors.push(ValidationError::new("upstream.read_timeout_ms", "must be > 0"));
    }

    validate_operation("resilience.similar_ids", &config.resilience.similar_ids, &mut errors);
    validate_operation(
        "resilience.product_detail",
        &config.resilience.product_detail,
        &mut errors,
    );

    if config.aggregation.max_concurrency == 0 {
        errors.push(ValidationError::new("aggregation.max_concurrency", "must be >= 1"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_operation(prefix: &str, op: &OperationConfig, errors: &mut Vec<ValidationError>) {
    let cb = &op.circuit_breaker;
    if !(cb.failure_rate_threshold > 0.0 && cb.failure_rate_threshold <= 1.0) {
        errors.push(ValidationError::new(
            format!("{prefix}.circuit_breaker.failure_rate_threshold"),
            "must be in (0, 1]",
        ));
    }
    if cb.minimum_calls == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.circuit_breaker.minimum_calls"),
            "must be >= 1",
        ));
    }
    if cb.window_secs == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.circuit_breaker.window_secs"),
            "must be > 0",
        ));
    }
    if cb.half_open_trials == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.circuit_breaker.half_open_trials"),
            "must be >= 1",
        ));
    }

    let retry = &op.retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.retry.max_attempts"),
            "must be >= 1",
        ));
    }
    if retry.max_delay_ms < retry.base_delay_ms {
        errors.push(ValidationError::new(
            format!("{prefix}.retry.max_delay_ms"),
            "must be >= base_delay_ms",
        ));
    }

    if op.cache.max_entries == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.cache.max_entries"),
            "must be >= 1",
        ));
    }
}
