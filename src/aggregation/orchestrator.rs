//! Fan-out of detail lookups for one root product.

use futures_util::{future, stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::AggregationConfig;
use crate::domain::{AggregationError, ProductDetail, ProductId, UpstreamError};
use crate::observability::metrics;
use crate::upstream::{Fetched, ResilientProductClient, Source};

/// Entry point for "list similar products".
pub struct SimilarProductsAggregator {
    client: Arc<ResilientProductClient>,
    max_concurrency: usize,
}

impl SimilarProductsAggregator {
    pub fn new(client: Arc<ResilientProductClient>, config: &AggregationConfig) -> Self {
        Self {
            client,
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    pub fn client(&self) -> &Arc<ResilientProductClient> {
        &self.client
    }

    /// Details of every product related to `root` that could be resolved.
    ///
    /// Only an invalid `root` or a failed related-ids lookup is an error.
    /// Detail lookups that fail or come back absent are left out.
    pub async fn find_similar_products(&self, root: &str) -> Result<HashSet<ProductDetail>, AggregationError> {
        let root = ProductId::parse(root)?;

        let related = self.client.fetch_related_ids(&root).await?;
        if let Source::Fallback(reason) = related.source {
            tracing::warn!(
                root = %root,
                reason = reason.as_str(),
                "Related ids unavailable, answering with an empty result"
            );
        }

        let requested = related.value.len();
        if requested == 0 {
            tracing::debug!(root = %root, "No related products");
            return Ok(HashSet::new());
        }

        let client = &self.client;
        let details: HashSet<ProductDetail> = stream::iter(related.value)
            .map(|id| async move {
                let outcome = client.fetch_detail(&id).await;
                (id, outcome)
            })
            .buffer_unordered(self.max_concurrency)
            .filter_map(|(id, outcome)| future::ready(keep_detail(&root, id, outcome)))
            .collect()
            .await;

        tracing::info!(
            root = %root,
            requested,
            returned = details.len(),
            "Similar products aggregated"
        );
        Ok(details)
    }
}

fn keep_detail(
    root: &ProductId,
    id: ProductId,
    outcome: Result<Fetched<Option<ProductDetail>>, UpstreamError>,
) -> Option<ProductDetail> {
    match outcome {
        Ok(Fetched { value: Some(detail), .. }) => Some(detail),
        Ok(Fetched { value: None, source }) => {
            let reason = match source {
                Source::Fallback(reason) => reason.as_str(),
                _ => "absent",
            };
            tracing::warn!(root = %root, id = %id, reason, "Excluding product from result");
            metrics::record_item_excluded(reason);
            None
        }
        Err(err) => {
            tracing::warn!(root = %root, id = %id, error = %err, "Excluding product after lookup failure");
            metrics::record_item_excluded(err.kind().as_str());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::domain::{InvalidProductId, RelatedIdSet};
    use crate::resilience::CircuitBreakerRegistry;
    use crate::upstream::ProductApi;
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Catalog with `count` related ids whose detail lookups each take 10ms.
    #[derive(Default)]
    struct SlowCatalog {
        count: usize,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl ProductApi for SlowCatalog {
        async fn similar_ids(&self, _id: &ProductId) -> Result<RelatedIdSet, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..self.count)
                .map(|n| ProductId::parse(&(n + 100).to_string()).unwrap())
                .collect())
        }

        async fn product_detail(&self, id: &ProductId) -> Result<ProductDetail, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(ProductDetail::new(id.clone(), "Prod", BigDecimal::from(1), true))
        }
    }

    fn aggregator(api: Arc<SlowCatalog>, max_concurrency: usize) -> SimilarProductsAggregator {
        let mut config = ServiceConfig::default();
        config.aggregation.max_concurrency = max_concurrency;
        let registry = CircuitBreakerRegistry::default();
        let client = ResilientProductClient::new(api, &config, &registry);
        SimilarProductsAggregator::new(Arc::new(client), &config.aggregation)
    }

    #[tokio::test]
    async fn test_invalid_root_makes_no_calls() {
        let api = Arc::new(SlowCatalog::default());
        let aggregator = aggregator(api.clone(), 4);

        let err = aggregator.find_similar_products("  ").await.unwrap_err();
        assert_eq!(err, AggregationError::InvalidInput(InvalidProductId::Empty));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_respects_concurrency_limit() {
        let api = Arc::new(SlowCatalog {
            count: 7,
            ..SlowCatalog::default()
        });
        let aggregator = aggregator(api.clone(), 3);

        let details = aggregator.find_similar_products("1").await.unwrap();
        assert_eq!(details.len(), 7);
        assert_eq!(api.max_in_flight.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_permit_is_sequential() {
        let api = Arc::new(SlowCatalog {
            count: 4,
            ..SlowCatalog::default()
        });
        let aggregator = aggregator(api.clone(), 1);

        let start = tokio::time::Instant::now();
        let details = aggregator.find_similar_products("1").await.unwrap();
        assert_eq!(details.len(), 4);
        assert_eq!(api.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
