//! Resilience-wrapped catalog operations.
//!
//! # Data Flow
//! ```text
//! fetch_related_ids / fetch_detail
//!     → ResponseCache::get_or_load (hit: return, Source::Cache)
//!     → CircuitBreaker::try_acquire (none: fallback, CircuitOpen)
//!     → RetryExecutor::execute(raw call)
//!     → permit records one outcome for the whole logical call
//!     → success is cached (Source::Upstream)
//!     → terminal error: fallback if the operation allows it, otherwise Err
//! ```
//!
//! # Design Decisions
//! - An open circuit always resolves to the fallback value
//! - Terminal errors resolve to the fallback only when `fallback_on_error` is set
//! - Fallback values are never cached

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{OperationConfig, ServiceConfig};
use crate::domain::{ProductDetail, ProductId, RelatedIdSet, UpstreamError};
use crate::observability::metrics;
use crate::resilience::{CacheStatus, CircuitBreaker, CircuitBreakerRegistry, ResponseCache, RetryExecutor};
use crate::upstream::{FallbackReason, Fetched, ProductApi, Source, PRODUCT_DETAIL, SIMILAR_IDS};

/// Why the guarded part of the chain produced no value.
#[derive(Debug)]
enum CallFailure {
    CircuitOpen,
    Upstream(UpstreamError),
}

/// One named upstream operation with its own cache, circuit and retry policy.
#[derive(Debug)]
pub struct ResilientOperation<V>
where
    V: Clone,
{
    name: &'static str,
    cache: ResponseCache<ProductId, V>,
    circuit: Arc<CircuitBreaker>,
    retry: RetryExecutor,
    fallback_on_error: bool,
}

impl<V> ResilientOperation<V>
where
    V: Clone,
{
    pub fn new(
        name: &'static str,
        config: &OperationConfig,
        fallback_on_error: bool,
        registry: &CircuitBreakerRegistry,
    ) -> Self {
        Self {
            name,
            cache: ResponseCache::from_config(name, &config.cache),
            circuit: registry.register(name, config.circuit_breaker.clone()),
            retry: RetryExecutor::from_config(name, &config.retry),
            fallback_on_error,
        }
    }

    /// Bound every raw attempt with `deadline`.
    pub fn with_attempt_timeout(mut self, deadline: Duration) -> Self {
        self.retry = self.retry.with_attempt_timeout(deadline);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn circuit(&self) -> &Arc<CircuitBreaker> {
        &self.circuit
    }

    pub fn cache(&self) -> &ResponseCache<ProductId, V> {
        &self.cache
    }

    /// Run the full chain for `id`.
    ///
    /// `Ok` with `value: None` means a fallback was taken; `source` says why.
    pub async fn call<F, Fut>(&self, id: &ProductId, raw: F) -> Result<Fetched<Option<V>>, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, UpstreamError>>,
    {
        match self.cache.get_or_load(id, || self.guarded(raw)).await {
            Ok((value, CacheStatus::Hit)) => Ok(Fetched::new(Some(value), Source::Cache)),
            Ok((value, CacheStatus::Miss)) => Ok(Fetched::new(Some(value), Source::Upstream)),
            Err(CallFailure::CircuitOpen) => Ok(self.fall_back(id, FallbackReason::CircuitOpen, None)),
            Err(CallFailure::Upstream(err)) if self.fallback_on_error => {
                let reason = FallbackReason::Error(err.kind());
                Ok(self.fall_back(id, reason, Some(&err)))
            }
            Err(CallFailure::Upstream(err)) => Err(err),
        }
    }

    async fn guarded<F, Fut>(&self, mut raw: F) -> Result<V, CallFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, UpstreamError>>,
    {
        let Some(permit) = self.circuit.try_acquire() else {
            return Err(CallFailure::CircuitOpen);
        };

        let name = self.name;
        let result = self
            .retry
            .execute(|| {
                let attempt = raw();
                async move {
                    let result = attempt.await;
                    let outcome = match &result {
                        Ok(_) => "success",
                        Err(e) => e.kind().as_str(),
                    };
                    metrics::record_upstream_call(name, outcome);
                    result
                }
            })
            .await;

        match &result {
            Ok(_) => permit.record_success(),
            Err(err) => permit.record_error(err),
        }
        result.map_err(CallFailure::Upstream)
    }

    fn fall_back(
        &self,
        id: &ProductId,
        reason: FallbackReason,
        error: Option<&UpstreamError>,
    ) -> Fetched<Option<V>> {
        match error {
            Some(err) => tracing::warn!(
                operation = self.name,
                id = %id,
                reason = reason.as_str(),
                error = %err,
                "Serving fallback after terminal failure"
            ),
            None => tracing::warn!(
                operation = self.name,
                id = %id,
                reason = reason.as_str(),
                "Serving fallback, circuit open"
            ),
        }
        metrics::record_fallback(self.name, reason.as_str());
        Fetched::new(None, Source::Fallback(reason))
    }
}

/// Catalog client with both operations wrapped in the resilience chain.
pub struct ResilientProductClient {
    api: Arc<dyn ProductApi>,
    similar_ids: ResilientOperation<RelatedIdSet>,
    product_detail: ResilientOperation<ProductDetail>,
}

impl ResilientProductClient {
    pub fn new(api: Arc<dyn ProductApi>, config: &ServiceConfig, registry: &CircuitBreakerRegistry) -> Self {
        let attempt_timeout = config.upstream.connect_timeout() + config.upstream.read_timeout();
        let resilience = &config.resilience;

        Self {
            api,
            similar_ids: ResilientOperation::new(
                SIMILAR_IDS,
                &resilience.similar_ids,
                resilience.similar_ids_fallback_on_error(),
                registry,
            )
            .with_attempt_timeout(attempt_timeout),
            product_detail: ResilientOperation::new(
                PRODUCT_DETAIL,
                &resilience.product_detail,
                resilience.product_detail_fallback_on_error(),
                registry,
            )
            .with_attempt_timeout(attempt_timeout),
        }
    }

    /// Related ids for `id`. A fallback yields an empty set.
    pub async fn fetch_related_ids(&self, id: &ProductId) -> Result<Fetched<RelatedIdSet>, UpstreamError> {
        let api = &self.api;
        let fetched = self.similar_ids.call(id, || api.similar_ids(id)).await?;
        Ok(Fetched::new(fetched.value.unwrap_or_default(), fetched.source))
    }

    /// Detail for `id`. A fallback yields `None`.
    pub async fn fetch_detail(&self, id: &ProductId) -> Result<Fetched<Option<ProductDetail>>, UpstreamError> {
        let api = &self.api;
        self.product_detail.call(id, || api.product_detail(id)).await
    }

    pub fn similar_ids_operation(&self) -> &ResilientOperation<RelatedIdSet> {
        &self.similar_ids
    }

    pub fn product_detail_operation(&self) -> &ResilientOperation<ProductDetail> {
        &self.product_detail
    }
}
