//! Aggregation behaviour over an in-memory catalog.

use std::collections::HashSet;

use similar_products::domain::{AggregationError, ErrorKind, InvalidProductId, UpstreamError};
use similar_products::resilience::CircuitStatus;
use similar_products::upstream::{PRODUCT_DETAIL, SIMILAR_IDS};

mod common;
use common::{fast_config, harness, prod_2, prod_3, product, FakeCatalog};

fn names(details: &HashSet<similar_products::domain::ProductDetail>) -> Vec<String> {
    let mut names: Vec<String> = details.iter().map(|d| d.name.clone()).collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_scenario_a_all_details_resolve() {
    let h = harness(
        FakeCatalog::new()
            .with_related("1", &["2", "3"])
            .with_detail(prod_2())
            .with_detail(prod_3()),
        fast_config(),
    );

    let result = h.aggregator.find_similar_products("1").await.unwrap();
    assert_eq!(result, HashSet::from([prod_2(), prod_3()]));

    let prod_2_out = result.iter().find(|d| d.id.as_str() == "2").unwrap();
    assert_eq!(prod_2_out.price.to_string(), "12.34");
    assert!(prod_2_out.availability);
}

#[tokio::test]
async fn test_scenario_b_transient_detail_is_excluded() {
    let h = harness(
        FakeCatalog::new()
            .with_related("1", &["2", "3"])
            .with_detail_error("2", UpstreamError::transient("status 500"))
            .with_detail(prod_3()),
        fast_config(),
    );

    let result = h.aggregator.find_similar_products("1").await.unwrap();
    assert_eq!(names(&result), vec!["Prod 3"]);

    // Three attempts for "2", one for "3".
    assert_eq!(h.catalog.detail_calls(), 4);
}

#[tokio::test]
async fn test_scenario_c_unknown_root_is_not_found() {
    let h = harness(FakeCatalog::new(), fast_config());

    let err = h.aggregator.find_similar_products("999").await.unwrap_err();
    match err {
        AggregationError::Upstream(upstream) => assert_eq!(upstream.kind(), ErrorKind::NotFound),
        other => panic!("expected not found, got {other:?}"),
    }
    assert_eq!(h.catalog.similar_calls(), 1);
    assert_eq!(h.catalog.detail_calls(), 0);
}

#[tokio::test]
async fn test_partial_failure_of_any_kind_is_absorbed() {
    let failures = [
        UpstreamError::NotFound { id: common::id("2") },
        UpstreamError::Client {
            status: 400,
            message: "bad".into(),
        },
        UpstreamError::transient("timeout"),
        UpstreamError::unexpected("garbage payload"),
    ];

    for failure in failures {
        let h = harness(
            FakeCatalog::new()
                .with_related("1", &["2", "3"])
                .with_detail_error("2", failure.clone())
                .with_detail(prod_3()),
            fast_config(),
        );

        let result = h.aggregator.find_similar_products("1").await.unwrap();
        assert_eq!(names(&result), vec!["Prod 3"], "failure {failure:?} leaked");
    }
}

#[tokio::test]
async fn test_empty_related_set_makes_no_detail_calls() {
    let h = harness(FakeCatalog::new().with_related("1", &[]), fast_config());

    let result = h.aggregator.find_similar_products("1").await.unwrap();
    assert!(result.is_empty());
    assert_eq!(h.catalog.detail_calls(), 0);
}

#[tokio::test]
async fn test_every_related_id_yields_one_detail() {
    let ids: Vec<String> = (10..30).map(|n| n.to_string()).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let mut catalog = FakeCatalog::new().with_related("1", &id_refs);
    for raw in &ids {
        catalog = catalog.with_detail(product(raw, &format!("Prod {raw}"), "1.00", true));
    }
    let h = harness(catalog, fast_config());

    let result = h.aggregator.find_similar_products("1").await.unwrap();
    assert_eq!(result.len(), ids.len());
    for raw in &ids {
        assert!(result.iter().any(|d| d.id.as_str() == raw));
    }
}

#[tokio::test]
async fn test_details_are_deduplicated_by_id() {
    // "2" and "02" are different ids upstream but resolve to the same product.
    let h = harness(
        FakeCatalog::new()
            .with_related("1", &["2", "02", " 2 "])
            .with_detail(prod_2())
            .with_detail_as("02", product("2", "Prod 2 (alias)", "12.34", true)),
        fast_config(),
    );

    let result = h.aggregator.find_similar_products("1").await.unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(h.catalog.detail_calls(), 2);
}

#[tokio::test]
async fn test_invalid_root_fails_before_any_call() {
    let h = harness(FakeCatalog::new(), fast_config());

    let err = h.aggregator.find_similar_products("").await.unwrap_err();
    assert_eq!(err, AggregationError::InvalidInput(InvalidProductId::Empty));
    assert_eq!(h.catalog.similar_calls(), 0);
}

#[tokio::test]
async fn test_root_failure_propagates_after_retries() {
    let h = harness(
        FakeCatalog::new().with_related_error("1", UpstreamError::transient("status 503")),
        fast_config(),
    );

    let err = h.aggregator.find_similar_products("1").await.unwrap_err();
    assert_eq!(err, AggregationError::Upstream(UpstreamError::transient("status 503")));
    assert_eq!(h.catalog.similar_calls(), 3);
}

#[tokio::test]
async fn test_open_related_ids_circuit_answers_empty_without_calls() {
    let mut config = fast_config();
    config.resilience.similar_ids.circuit_breaker.minimum_calls = 2;
    config.resilience.similar_ids.retry.max_attempts = 1;
    let h = harness(
        FakeCatalog::new().with_related_error("1", UpstreamError::transient("status 503")),
        config,
    );

    for _ in 0..2 {
        assert!(h.aggregator.find_similar_products("1").await.is_err());
    }
    assert_eq!(
        h.registry.get(SIMILAR_IDS).unwrap().status(),
        CircuitStatus::Open
    );

    let result = h.aggregator.find_similar_products("1").await.unwrap();
    assert!(result.is_empty());
    assert_eq!(h.catalog.similar_calls(), 2);
}

#[tokio::test]
async fn test_open_detail_circuit_excludes_without_calls() {
    let mut config = fast_config();
    config.resilience.product_detail.circuit_breaker.minimum_calls = 2;
    config.resilience.product_detail.retry.max_attempts = 1;
    config.aggregation.max_concurrency = 1;

    let h = harness(
        FakeCatalog::new()
            .with_related("1", &["2", "3", "4", "5"])
            .with_detail_error("2", UpstreamError::transient("status 503"))
            .with_detail_error("3", UpstreamError::transient("status 503"))
            .with_detail(product("4", "Prod 4", "4.00", true))
            .with_detail(product("5", "Prod 5", "5.00", true)),
        config,
    );

    // Related ids are ordered, so "2" and "3" trip the circuit first.
    let result = h.aggregator.find_similar_products("1").await.unwrap();
    assert!(result.is_empty());
    assert_eq!(h.catalog.detail_calls(), 2);
    assert_eq!(
        h.registry.get(PRODUCT_DETAIL).unwrap().status(),
        CircuitStatus::Open
    );
}
