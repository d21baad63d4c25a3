//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests short-circuit to the fallback
//! - Half-Open: a limited number of trial requests probe for recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: calls >= minimum_calls and failure ratio >= threshold within window
//! Open → Half-Open: first acquire after open_cooldown
//! Half-Open → Closed: a trial succeeds (window reset)
//! Half-Open → Open: a trial fails (cooldown restarts)
//! ```
//!
//! # Design Decisions
//! - One registry per process, one circuit per operation name
//! - Each circuit has its own lock; unrelated circuits never contend
//! - Permits carry the generation they were issued in; outcomes reported
//!   after a transition are discarded
//! - Not-found outcomes never move counters; a trial that ends in
//!   not-found returns its slot

use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::domain::UpstreamError;
use crate::observability::metrics;

/// Externally visible circuit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitStatus {
    fn as_str(self) -> &'static str {
        match self {
            CircuitStatus::Closed => "closed",
            CircuitStatus::Open => "open",
            CircuitStatus::HalfOpen => "half_open",
        }
    }
}

/// How a permitted call ended, from the circuit's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    Ignored,
}

#[derive(Debug)]
struct CircuitState {
    status: CircuitStatus,
    failure_count: u32,
    call_count: u32,
    window_start: Instant,
    opened_at: Option<Instant>,
    half_open_trials_remaining: u32,
    generation: u64,
}

impl CircuitState {
    fn new(now: Instant) -> Self {
        Self {
            status: CircuitStatus::Closed,
            failure_count: 0,
            call_count: 0,
            window_start: now,
            opened_at: None,
            half_open_trials_remaining: 0,
            generation: 0,
        }
    }

    fn reset_window(&mut self, now: Instant) {
        self.failure_count = 0;
        self.call_count = 0;
        self.window_start = now;
    }
}

/// Point-in-time copy of a circuit, taken under its lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub status: CircuitStatus,
    pub failure_count: u32,
    pub call_count: u32,
    pub half_open_trials_remaining: u32,
    pub open_for_ms: Option<u64>,
}

/// A single named circuit.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<CircuitState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(CircuitState::new(Instant::now())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, CircuitState> {
        // Counters stay consistent even if a holder panicked mid-update.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ask to make a raw call.
    ///
    /// Returns `None` when the call must short-circuit to the fallback.
    pub fn try_acquire(self: &Arc<Self>) -> Option<CircuitPermit> {
        let mut state = self.lock();
        let now = Instant::now();

        if state.status == CircuitStatus::Open {
            let cooled_down = state
                .opened_at
                .map(|opened| now.duration_since(opened) >= self.config.open_cooldown())
                .unwrap_or(true);
            if !cooled_down {
                return None;
            }
            self.transition(&mut state, CircuitStatus::HalfOpen, now);
        }

        match state.status {
            CircuitStatus::Closed => {
                if now.duration_since(state.window_start) >= self.config.window() {
                    state.reset_window(now);
                }
                Some(CircuitPermit::new(self.clone(), state.generation, false))
            }
            CircuitStatus::HalfOpen => {
                if state.half_open_trials_remaining == 0 {
                    return None;
                }
                state.half_open_trials_remaining -= 1;
                tracing::debug!(circuit = %self.name, "Half-open trial permitted");
                Some(CircuitPermit::new(self.clone(), state.generation, true))
            }
            CircuitStatus::Open => None,
        }
    }

    pub fn status(&self) -> CircuitStatus {
        self.lock().status
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.lock();
        CircuitSnapshot {
            name: self.name.clone(),
            status: state.status,
            failure_count: state.failure_count,
            call_count: state.call_count,
            half_open_trials_remaining: state.half_open_trials_remaining,
            open_for_ms: state
                .opened_at
                .filter(|_| state.status == CircuitStatus::Open)
                .map(|opened| opened.elapsed().as_millis() as u64),
        }
    }

    fn settle(&self, generation: u64, trial: bool, outcome: Outcome) {
        let mut state = self.lock();
        if state.generation != generation {
            tracing::trace!(circuit = %self.name, ?outcome, "Discarding outcome from stale permit");
            return;
        }
        let now = Instant::now();

        match (state.status, outcome) {
            (CircuitStatus::HalfOpen, Outcome::Success) if trial => {
                self.transition(&mut state, CircuitStatus::Closed, now);
            }
            (CircuitStatus::HalfOpen, Outcome::Failure) if trial => {
                self.transition(&mut state, CircuitStatus::Open, now);
            }
            (CircuitStatus::HalfOpen, Outcome::Ignored) if trial => {
                state.half_open_trials_remaining =
                    (state.half_open_trials_remaining + 1).min(self.config.half_open_trials);
            }
            (CircuitStatus::Closed, Outcome::Success) => {
                state.call_count += 1;
                self.evaluate(&mut state, now);
            }
            (CircuitStatus::Closed, Outcome::Failure) => {
                state.call_count += 1;
                state.failure_count += 1;
                self.evaluate(&mut state, now);
            }
            _ => {}
        }
    }

    fn evaluate(&self, state: &mut CircuitState, now: Instant) {
        if state.call_count < self.config.minimum_calls {
            return;
        }
        let failure_rate = state.failure_count as f64 / state.call_count as f64;
        if failure_rate >= self.config.failure_rate_threshold {
            tracing::warn!(
                circuit = %self.name,
                failures = state.failure_count,
                calls = state.call_count,
                failure_rate,
                "Failure threshold reached, opening circuit"
            );
            self.transition(state, CircuitStatus::Open, now);
        }
    }

    fn transition(&self, state: &mut CircuitState, to: CircuitStatus, now: Instant) {
        let from = state.status;
        if from == to {
            return;
        }

        state.status = to;
        state.generation += 1;
        match to {
            CircuitStatus::Open => {
                state.opened_at = Some(now);
                state.half_open_trials_remaining = 0;
            }
            CircuitStatus::HalfOpen => {
                state.half_open_trials_remaining = self.config.half_open_trials;
            }
            CircuitStatus::Closed => {
                state.opened_at = None;
                state.half_open_trials_remaining = 0;
                state.reset_window(now);
            }
        }

        tracing::info!(circuit = %self.name, from = ?from, to = ?to, "Circuit state transition");
        metrics::record_circuit_transition(&self.name, from.as_str(), to.as_str());
    }
}

/// Permission to make one raw call.
///
/// Report the outcome with one of the `record_*` methods. Dropping the
/// permit unreported is treated as an ignored outcome.
#[derive(Debug)]
pub struct CircuitPermit {
    breaker: Arc<CircuitBreaker>,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl CircuitPermit {
    fn new(breaker: Arc<CircuitBreaker>, generation: u64, trial: bool) -> Self {
        Self {
            breaker,
            generation,
            trial,
            settled: false,
        }
    }

    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record_success(self) {
        self.finish(Outcome::Success);
    }

    pub fn record_failure(self) {
        self.finish(Outcome::Failure);
    }

    pub fn record_ignored(self) {
        self.finish(Outcome::Ignored);
    }

    /// Record an upstream error according to its classification.
    pub fn record_error(self, error: &UpstreamError) {
        if error.counts_as_failure() {
            self.record_failure();
        } else {
            self.record_ignored();
        }
    }

    fn finish(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.settle(self.generation, self.trial, outcome);
    }
}

impl Drop for CircuitPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.settle(self.generation, self.trial, Outcome::Ignored);
        }
    }
}

/// Process-wide set of named circuits.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    circuits: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: DashMap::new(),
            default_config,
        }
    }

    /// Get the circuit for `name`, creating it with `config` if absent.
    pub fn register(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        self.circuits
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, config)))
            .value()
            .clone()
    }

    /// Get the circuit for `name`, creating it with the default config if absent.
    pub fn circuit(&self, name: &str) -> Arc<CircuitBreaker> {
        self.register(name, self.default_config.clone())
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.circuits.get(name).map(|entry| entry.value().clone())
    }

    /// Snapshots of every circuit, sorted by name.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.circuits.iter().map(|entry| entry.value().clone()).collect();
        let mut snapshots: Vec<CircuitSnapshot> = breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
