//! Immutable Cache Integration Tests
//!
//! The immutable path is for payloads that never change once produced, like
//! finalized blocks. These tests cover:
//!
//! - Age-blind hits: entries serve forever, no TTL involved
//! - Strict capacity enforcement with least-recently-used eviction
//! - Recently read entries surviving eviction pressure
//! - Cacheability gating keeping junk out of the bounded store

use mockito::{Matcher, Server};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use vigil_core::fetch::{HttpClient, HttpConfig, Poller, RequestShape};

fn poller_with_capacity(max_entries: usize) -> Poller {
    let client = Arc::new(HttpClient::new(&HttpConfig::default()).unwrap());
    Poller::new(client, max_entries).unwrap()
}

fn result_of(payload: &Value) -> Option<Value> {
    payload.get("result").cloned()
}

fn block_body(slot: u64) -> RequestShape {
    RequestShape::Post(json!({"method": "getBlock", "params": [slot]}))
}

async fn mock_block(server: &mut Server, slot: u64, hits: usize) -> mockito::Mock {
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"params": [slot]})))
        .with_status(200)
        .with_body(format!(r#"{{"result": {{"slot": {slot}}}}}"#))
        .expect(hits)
        .create_async()
        .await
}

#[tokio::test]
async fn test_entries_serve_regardless_of_age() {
    let mut server = Server::new_async().await;
    let mock = mock_block(&mut server, 310, 1).await;

    let poller = poller_with_capacity(10);
    let url = server.url();

    let first = poller.fetch_immutable(&url, block_body(310), result_of).await.unwrap();
    assert_eq!(first, json!({"slot": 310}));

    sleep(Duration::from_millis(150)).await;
    mock.assert_async().await;

    // No TTL applies: the entry is still a hit, even after the server
    // stops answering.
    server.reset();
    let second = poller.fetch_immutable(&url, block_body(310), result_of).await.unwrap();
    assert_eq!(second, json!({"slot": 310}));
}

#[tokio::test]
async fn test_capacity_bound_holds_under_distinct_keys() {
    let mut server = Server::new_async().await;
    let mut mocks = Vec::new();
    for slot in 0..5 {
        mocks.push(mock_block(&mut server, slot, 1).await);
    }

    let poller = poller_with_capacity(3);
    let url = server.url();

    for slot in 0..5 {
        let value = poller.fetch_immutable(&url, block_body(slot), result_of).await.unwrap();
        assert_eq!(value, json!({"slot": slot}));
    }

    for mock in &mocks {
        mock.assert_async().await;
    }
    assert_eq!(poller.immutable().len().await, 3);
}

#[tokio::test]
async fn test_recently_read_entries_survive_eviction() {
    let mut server = Server::new_async().await;
    let mock_a = mock_block(&mut server, 1, 1).await;
    let mock_b = mock_block(&mut server, 2, 2).await;
    let _mock_c = mock_block(&mut server, 3, 1).await;

    let poller = poller_with_capacity(2);
    let url = server.url();

    poller.fetch_immutable(&url, block_body(1), result_of).await.unwrap();
    poller.fetch_immutable(&url, block_body(2), result_of).await.unwrap();

    // Reading slot 1 promotes it, so inserting slot 3 evicts slot 2.
    poller.fetch_immutable(&url, block_body(1), result_of).await.unwrap();
    poller.fetch_immutable(&url, block_body(3), result_of).await.unwrap();

    poller.fetch_immutable(&url, block_body(1), result_of).await.unwrap();
    poller.fetch_immutable(&url, block_body(2), result_of).await.unwrap();

    mock_a.assert_async().await;
    mock_b.assert_async().await;
}

#[tokio::test]
async fn test_cacheability_gate_keeps_rejects_out_of_the_store() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(r#"{"result": 7}"#)
        .expect(2)
        .create_async()
        .await;

    let poller = poller_with_capacity(10);
    let url = server.url();
    let only_even = |value: &Value| value.as_u64().is_some_and(|n| n % 2 == 0);

    for _ in 0..2 {
        let value = poller
            .fetch_immutable_with(&url, block_body(99), result_of, 10, only_even)
            .await
            .unwrap();
        // The odd value is still served to the caller.
        assert_eq!(value, json!(7));
    }

    mock.assert_async().await;
    assert_eq!(poller.immutable().len().await, 0);
}

#[tokio::test]
async fn test_default_gate_rejects_null_results() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(r#"{"result": null}"#)
        .expect(2)
        .create_async()
        .await;

    let poller = poller_with_capacity(10);
    let url = server.url();

    for _ in 0..2 {
        let value = poller
            .fetch_immutable(&url, block_body(500), |payload| {
                Some(payload.get("result").cloned().unwrap_or(Value::Null))
            })
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    mock.assert_async().await;
    assert_eq!(poller.immutable().len().await, 0);
}

#[tokio::test]
async fn test_failures_propagate_instead_of_serving_null() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(429)
        .with_body("rate limited")
        .create_async()
        .await;

    let poller = poller_with_capacity(10);

    let result = poller
        .fetch_immutable(&server.url(), block_body(310), result_of)
        .await;

    assert!(result.is_err());
    assert_eq!(poller.immutable().len().await, 0);
}
