//! Properties that must hold for any request: hits are the AND of every
//! filter, and each facet is computed without its own filter.

use super::{endpoint_with, hit_ids, product_features, products_endpoint, run};
use crate::Response;
use std::collections::BTreeSet;

const REQUESTS: &[&[(&str, &str)]] = &[
    &[("category", "electronics"), ("active", "true")],
    &[("category", "home"), ("category", "sports"), ("rating.max", "3.5")],
    &[("active", "true"), ("reviews.author", "Dan Green")],
    &[
        ("rating.min", "3"),
        ("reviews.verified", "false"),
        ("created_at.max", "2024-01-12"),
    ],
    &[
        ("category", "electronics"),
        ("reviews.author", "Alice Brown"),
        ("reviews.rating.min", "5"),
    ],
];

/// Facet name a parameter belongs to.
fn facet_of(param: &str) -> &str {
    param
        .strip_suffix(".min")
        .or_else(|| param.strip_suffix(".max"))
        .unwrap_or(param)
}

fn ids(resp: &Response) -> BTreeSet<String> {
    hit_ids(resp).into_iter().map(str::to_string).collect()
}

#[tokio::test]
async fn test_hits_are_intersection_of_each_filter() {
    let ep = products_endpoint();
    for request in REQUESTS {
        let mut facets: Vec<&str> = request.iter().map(|(k, _)| facet_of(k)).collect();
        facets.dedup();
        // several filters on one nested path must hold for the same review,
        // which a per-product intersection cannot express
        if facets.iter().filter(|f| f.starts_with("reviews.")).count() > 1 {
            continue;
        }

        let combined = ids(&run(&ep, request).await);
        let mut expected: Option<BTreeSet<String>> = None;
        for facet in facets {
            let single: Vec<(&str, &str)> = request
                .iter()
                .copied()
                .filter(|(k, _)| facet_of(k) == facet)
                .collect();
            let matched = ids(&run(&ep, &single).await);
            expected = Some(match expected {
                Some(acc) => acc.intersection(&matched).cloned().collect(),
                None => matched,
            });
        }
        assert_eq!(Some(combined), expected, "request {request:?}");
    }
}

#[tokio::test]
async fn test_nested_filters_match_one_subdocument() {
    let ep = products_endpoint();
    // Alice Brown rated p1 and p5 with 4 and p2 with 5
    let resp = run(
        &ep,
        &[("reviews.author", "Alice Brown"), ("reviews.rating.min", "5")],
    )
    .await;
    assert_eq!(hit_ids(&resp), vec!["p2"]);
    assert_eq!(resp.hits[0].inner_hits("reviews").len(), 1);
}

#[tokio::test]
async fn test_facet_ignores_own_parameters() {
    let ep = products_endpoint();
    for request in REQUESTS {
        let full = run(&ep, request).await;
        for (param, _) in request.iter() {
            let facet = facet_of(param);
            let without: Vec<(&str, &str)> = request
                .iter()
                .copied()
                .filter(|(k, _)| facet_of(k) != facet)
                .collect();
            let reduced = run(&ep, &without).await;
            assert_eq!(
                full.buckets(facet),
                reduced.buckets(facet),
                "facet {facet} in request {request:?}"
            );
        }
    }
}

#[tokio::test]
async fn test_boolean_facets_always_two_buckets() {
    let ep = products_endpoint();
    for request in REQUESTS.iter().chain([&[("category", "nothing")][..]].iter()) {
        let resp = run(&ep, request).await;
        for name in ["active", "reviews.verified"] {
            let keys = super::keys(&resp, name);
            assert_eq!(keys, vec!["false", "true"], "{name} in {request:?}");
        }
    }
}

#[tokio::test]
async fn test_rating_never_reports_zero_bucket() {
    let ep = products_endpoint();
    for request in REQUESTS {
        let resp = run(&ep, request).await;
        assert!(resp
            .buckets("rating")
            .unwrap()
            .iter()
            .all(|b| b.key.as_number() != Some(0.0)));
    }
}

#[tokio::test]
async fn test_execute_is_idempotent() {
    let ep = products_endpoint();
    for request in REQUESTS {
        let first = run(&ep, request).await;
        let second = run(&ep, request).await;
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn test_registration_order_does_not_change_results() {
    let forward = products_endpoint();
    let mut reversed_features = product_features();
    reversed_features.reverse();
    let reversed = endpoint_with(reversed_features);

    for request in REQUESTS {
        let a = run(&forward, request).await;
        let b = run(&reversed, request).await;
        assert_eq!(a, b, "request {request:?}");
    }
}

#[test]
fn test_query_description_is_deterministic() {
    let ep = products_endpoint();
    let request = crate::Request::from_pairs([("category", "home"), ("reviews.author", "Dan Green")]);
    let a = ep.build_query(&request).unwrap();
    let b = ep.build_query(&request).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
}
