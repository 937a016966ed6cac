//! One endpoint shared across tasks.

use super::{products_endpoint, run};
use crate::{Context, Request, Response};
use std::sync::Arc;

const MIXED: &[&[(&str, &str)]] = &[
    &[],
    &[("category", "electronics")],
    &[("active", "false")],
    &[("rating.min", "3")],
    &[("created_at.max", "2024-01-12")],
    &[("reviews.author", "Bob Smith")],
    &[("reviews.verified", "false"), ("category", "home")],
    &[("reviews.rating.min", "4"), ("active", "true")],
];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_execute_matches_sequential() {
    let ep = Arc::new(products_endpoint());

    let mut expected: Vec<Response> = Vec::new();
    for request in MIXED {
        expected.push(run(&ep, request).await);
    }

    let mut handles = Vec::new();
    for round in 0..8 {
        for (i, request) in MIXED.iter().enumerate() {
            let ep = Arc::clone(&ep);
            let request = Request::from_pairs(request.iter().copied());
            handles.push(tokio::spawn(async move {
                let resp = ep.execute(&Context::new(), &request).await.unwrap();
                (round, i, resp)
            }));
        }
    }

    for handle in handles {
        let (round, i, resp) = handle.await.unwrap();
        assert_eq!(resp, expected[i], "round {round} request {:?}", MIXED[i]);
    }
}

#[tokio::test]
async fn test_joined_futures_share_endpoint() {
    let ep = products_endpoint();
    let ctx = Context::new();
    let a = Request::from_pairs([("category", "home")]);
    let b = Request::from_pairs([("category", "books")]);

    let (ra, rb) = tokio::join!(ep.execute(&ctx, &a), ep.execute(&ctx, &b));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.total, 1);
    assert_eq!(rb.total, 1);
    assert_eq!(ra.hits[0].id, "p3");
    assert_eq!(rb.hits[0].id, "p5");
    // category ignores its own filter, so both see the same buckets
    assert_eq!(ra.buckets("category"), rb.buckets("category"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelling_one_call_leaves_others_running() {
    let ep = Arc::new(products_endpoint());
    let (cancelled_ctx, handle) = Context::cancellable();
    handle.cancel();

    let live = {
        let ep = Arc::clone(&ep);
        tokio::spawn(async move {
            ep.execute(&Context::new(), &Request::from_pairs([("active", "true")]))
                .await
        })
    };
    let dead = ep
        .execute(&cancelled_ctx, &Request::from_pairs([("active", "true")]))
        .await;

    assert!(matches!(dead, Err(crate::FacetError::Cancelled)));
    assert_eq!(live.await.unwrap().unwrap().total, 4);
}
