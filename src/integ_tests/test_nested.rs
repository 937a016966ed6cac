//! Nested scopes: inner hits, two-level nesting and per-level facet contexts.

use super::{endpoint_with, hit_ids, init_tracing, keys, counts, products_backend, products_endpoint, run};
use crate::{
    BooleanFilter, DynamicFilter, Endpoint, EndpointSettings, MemoryBackend,
    NestedDocumentWrapper,
};
use serde_json::json;

// ============================================================
// Inner hits
// ============================================================

#[tokio::test]
async fn test_inner_hits_absent_without_nested_filter() {
    let ep = products_endpoint();
    let resp = run(&ep, &[("category", "home")]).await;
    assert_eq!(hit_ids(&resp), vec!["p3"]);
    assert!(resp.hits[0].inner_hits.is_empty());
}

#[tokio::test]
async fn test_inner_hits_only_when_requested() {
    let ep = endpoint_with(vec![NestedDocumentWrapper::new("reviews")
        .with_features([DynamicFilter::new("reviews.author").into()])
        .into()]);
    let resp = run(&ep, &[("reviews.author", "Kevin White")]).await;
    assert_eq!(hit_ids(&resp), vec!["p1", "p3"]);
    assert!(resp.hits.iter().all(|d| d.inner_hits.is_empty()));
}

#[tokio::test]
async fn test_inner_hits_respect_size_setting() {
    init_tracing();
    let settings = EndpointSettings {
        inner_hits_size: 1,
        ..EndpointSettings::new(["products"])
    };
    let mut ep = Endpoint::new(products_backend(), settings);
    ep.register([NestedDocumentWrapper::new("reviews")
        .with_features([BooleanFilter::new("reviews.verified").into()])
        .with_inner_hits()
        .into()])
        .unwrap();
    let resp = run(&ep, &[("reviews.verified", "true")]).await;
    assert_eq!(resp.total, 5);
    assert!(resp.hits.iter().all(|d| d.inner_hits("reviews").len() == 1));
}

#[tokio::test]
async fn test_hits_per_page_limits_hits_not_total() {
    init_tracing();
    let settings = EndpointSettings {
        hits_per_page: 2,
        ..EndpointSettings::new(["products"])
    };
    let mut ep = Endpoint::new(products_backend(), settings);
    ep.register([DynamicFilter::new("category").into()]).unwrap();
    let resp = run(&ep, &[]).await;
    assert_eq!(resp.total, 5);
    assert_eq!(hit_ids(&resp), vec!["p1", "p2"]);
}

// ============================================================
// Two-level nesting
// ============================================================

fn threads_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend
        .insert(
            "threads",
            "q1",
            json!({
                "title": "first",
                "reviews": [
                    {"author": "A", "comments": [
                        {"user": "u1", "helpful": true},
                        {"user": "u2", "helpful": false}
                    ]},
                    {"author": "B", "comments": [
                        {"user": "u1", "helpful": false}
                    ]}
                ]
            }),
        )
        .unwrap();
    backend
        .insert(
            "threads",
            "q2",
            json!({
                "title": "second",
                "reviews": [
                    {"author": "A", "comments": [
                        {"user": "u3", "helpful": true}
                    ]}
                ]
            }),
        )
        .unwrap();
    backend
}

fn threads_endpoint() -> Endpoint {
    init_tracing();
    let mut ep = Endpoint::new(threads_backend(), EndpointSettings::new(["threads"]));
    ep.register([NestedDocumentWrapper::new("reviews")
        .with_features([
            DynamicFilter::new("reviews.author").into(),
            NestedDocumentWrapper::new("reviews.comments")
                .with_features([
                    DynamicFilter::new("reviews.comments.user").into(),
                    BooleanFilter::new("reviews.comments.helpful").into(),
                ])
                .with_inner_hits()
                .into(),
        ])
        .with_inner_hits()
        .into()])
        .unwrap();
    ep
}

#[tokio::test]
async fn test_two_level_filter_and_inner_hits() {
    let ep = threads_endpoint();
    let resp = run(&ep, &[("reviews.comments.user", "u1")]).await;

    assert_eq!(hit_ids(&resp), vec!["q1"]);
    let reviews = resp.hits[0].inner_hits("reviews");
    assert_eq!(reviews.len(), 2);
    for review in reviews {
        let comments = review.inner_hits("reviews.comments");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].get("user"), Some(&json!("u1")));
    }
}

#[tokio::test]
async fn test_two_level_facet_contexts() {
    let ep = threads_endpoint();
    let resp = run(&ep, &[("reviews.comments.user", "u1")]).await;

    // own facet: every comment
    assert_eq!(keys(&resp, "reviews.comments.user"), vec!["u1", "u2", "u3"]);
    assert_eq!(counts(&resp, "reviews.comments.user"), vec![2, 1, 1]);
    // parent level: reviews with a u1 comment
    assert_eq!(keys(&resp, "reviews.author"), vec!["A", "B"]);
    assert_eq!(counts(&resp, "reviews.author"), vec![1, 1]);
    // sibling at the same level: u1's comments only
    assert_eq!(counts(&resp, "reviews.comments.helpful"), vec![1, 1]);
}

#[tokio::test]
async fn test_two_level_filters_at_both_levels() {
    let ep = threads_endpoint();
    let resp = run(
        &ep,
        &[("reviews.author", "A"), ("reviews.comments.helpful", "true")],
    )
    .await;

    assert_eq!(hit_ids(&resp), vec!["q1", "q2"]);
    assert_eq!(keys(&resp, "reviews.comments.user"), vec!["u1", "u3"]);
    assert_eq!(counts(&resp, "reviews.author"), vec![2]);
}

#[tokio::test]
async fn test_child_inner_hits_without_parent_inner_hits() {
    init_tracing();
    let mut ep = Endpoint::new(threads_backend(), EndpointSettings::new(["threads"]));
    ep.register([NestedDocumentWrapper::new("reviews")
        .with_features([NestedDocumentWrapper::new("reviews.comments")
            .with_features([DynamicFilter::new("reviews.comments.user").into()])
            .with_inner_hits()
            .into()])
        .into()])
        .unwrap();

    let resp = run(&ep, &[("reviews.comments.user", "u1")]).await;

    assert_eq!(hit_ids(&resp), vec!["q1"]);
    assert!(resp.hits[0].inner_hits("reviews").is_empty());
    // one u1 comment under each of q1's two reviews
    let comments = resp.hits[0].inner_hits("reviews.comments");
    assert_eq!(comments.len(), 2);
    assert!(comments.iter().all(|c| c.get("user") == Some(&json!("u1"))));
}
