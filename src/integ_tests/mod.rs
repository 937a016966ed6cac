//! Integration tests kept inline so they run in-process with `cargo test --lib`.
//!
//! Everything here goes through the public [`Endpoint`] API against the
//! in-memory backend loaded with the product fixture below.

mod test_concurrency;
mod test_nested;
mod test_self_exclusion;

use crate::{
    BooleanFilter, Context, DateHistogram, DynamicFilter, Endpoint, EndpointSettings, Feature,
    FixedInterval, Histogram, MemoryBackend, NestedDocumentWrapper, Request, Response,
};
use serde_json::json;

// ============================================================
// Shared helpers
// ============================================================

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn review(author: &str, rating: u32, date: &str, verified: bool) -> serde_json::Value {
    json!({
        "author": author,
        "rating": rating,
        "date": date,
        "verified": verified,
    })
}

/// Five products with 2-4 nested reviews each.
///
/// Zero ratings mark unrated products.
pub(crate) fn products_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    let products = [
        (
            "p1",
            json!({
                "name": "Laptop Pro",
                "category": "electronics",
                "active": true,
                "rating": 4.0,
                "created_at": "2024-01-10T09:00:00Z",
                "reviews": [
                    review("Kevin White", 5, "2024-02-01", true),
                    review("Alice Brown", 4, "2024-02-03", true),
                    review("Bob Smith", 3, "2024-02-05", false),
                ],
            }),
        ),
        (
            "p2",
            json!({
                "name": "Smartphone X",
                "category": "electronics",
                "active": true,
                "rating": 3.8,
                "created_at": "2024-01-11T10:00:00Z",
                "reviews": [
                    review("Alice Brown", 5, "2024-02-02", true),
                    review("Carol Jones", 4, "2024-02-04", true),
                ],
            }),
        ),
        (
            "p3",
            json!({
                "name": "Coffee Maker",
                "category": "home",
                "active": true,
                "rating": 3.2,
                "created_at": "2024-01-12T11:00:00Z",
                "reviews": [
                    review("Kevin White", 3, "2024-02-06", true),
                    review("Dan Green", 2, "2024-02-07", true),
                    review("Erin Black", 4, "2024-02-08", true),
                    review("Bob Smith", 1, "2024-02-09", false),
                ],
            }),
        ),
        (
            "p4",
            json!({
                "name": "Running Shoes",
                "category": "sports",
                "active": true,
                "rating": 0,
                "created_at": "2024-01-13T12:00:00Z",
                "reviews": [
                    review("Carol Jones", 4, "2024-02-10", true),
                    review("Dan Green", 5, "2024-02-11", true),
                ],
            }),
        ),
        (
            "p5",
            json!({
                "name": "Novel",
                "category": "books",
                "active": false,
                "rating": 0,
                "created_at": "2024-01-13T15:00:00Z",
                "reviews": [
                    review("Erin Black", 5, "2024-02-12", true),
                    review("Alice Brown", 4, "2024-02-13", true),
                    review("Frank Moore", 2, "2024-02-14", false),
                ],
            }),
        ),
    ];
    for (id, source) in products {
        backend.insert("products", id, source).unwrap();
    }
    backend
}

fn reviews_wrapper() -> NestedDocumentWrapper {
    NestedDocumentWrapper::new("reviews")
        .with_features([
            DynamicFilter::new("reviews.author").into(),
            Histogram::new("reviews.rating", 1.0).into(),
            BooleanFilter::new("reviews.verified").into(),
        ])
        .with_inner_hits()
}

/// The catalogue's full feature set, in registration order.
pub(crate) fn product_features() -> Vec<Feature> {
    vec![
        DynamicFilter::new("category").into(),
        BooleanFilter::new("active").into(),
        Histogram::new("rating", 1.0).without_zero_bucket().into(),
        DateHistogram::new("created_at", FixedInterval::days(1))
            .with_date_format("yyyy-MM-dd")
            .into(),
        reviews_wrapper().into(),
    ]
}

pub(crate) fn endpoint_with(features: Vec<Feature>) -> Endpoint {
    init_tracing();
    let mut endpoint = Endpoint::new(products_backend(), EndpointSettings::new(["products"]));
    endpoint.register(features).unwrap();
    endpoint
}

pub(crate) fn products_endpoint() -> Endpoint {
    endpoint_with(product_features())
}

pub(crate) async fn run(endpoint: &Endpoint, pairs: &[(&str, &str)]) -> Response {
    let request = Request::from_pairs(pairs.iter().copied());
    endpoint.execute(&Context::new(), &request).await.unwrap()
}

pub(crate) fn keys(resp: &Response, name: &str) -> Vec<String> {
    resp.buckets(name)
        .unwrap_or_else(|| panic!("no aggregation '{name}'"))
        .iter()
        .map(|b| b.key.to_string())
        .collect()
}

pub(crate) fn counts(resp: &Response, name: &str) -> Vec<u64> {
    resp.buckets(name)
        .unwrap_or_else(|| panic!("no aggregation '{name}'"))
        .iter()
        .map(|b| b.count)
        .collect()
}

pub(crate) fn hit_ids(resp: &Response) -> Vec<&str> {
    resp.hits.iter().map(|d| d.id.as_str()).collect()
}
