//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, upstream calls, cache, fallbacks, circuits)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `http_requests_total` (counter): inbound requests by status
//! - `http_request_duration_seconds` (histogram): inbound latency
//! - `upstream_calls_total` (counter): raw catalog calls by operation, outcome
//! - `retries_total` (counter): retry attempts by operation
//! - `cache_lookups_total` (counter): lookups by namespace, hit/miss
//! - `fallbacks_total` (counter): fallback resolutions by operation, reason
//! - `circuit_transitions_total` (counter): state changes by circuit
//! - `aggregation_items_excluded_total` (counter): detail lookups dropped from a result
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels are static strings or short names; ids never become labels

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, start: Instant) {
    counter!("http_requests_total", "status" => status.to_string()).increment(1);
    histogram!("http_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_call(operation: &'static str, outcome: &'static str) {
    counter!("upstream_calls_total", "operation" => operation, "outcome" => outcome).increment(1);
}

pub fn record_retry(operation: &'static str) {
    counter!("retries_total", "operation" => operation).increment(1);
}

pub fn record_cache_lookup(namespace: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("cache_lookups_total", "namespace" => namespace, "result" => result).increment(1);
}

pub fn record_fallback(operation: &'static str, reason: &'static str) {
    counter!("fallbacks_total", "operation" => operation, "reason" => reason).increment(1);
}

pub fn record_circuit_transition(circuit: &str, from: &'static str, to: &'static str) {
    counter!(
        "circuit_transitions_total",
        "circuit" => circuit.to_string(),
        "from" => from,
        "to" => to
    )
    .increment(1);
}

pub fn record_item_excluded(reason: &'static str) {
    counter!("aggregation_items_excluded_total", "reason" => reason).increment(1);
}
