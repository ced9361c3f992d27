//! Request Identity Tests
//!
//! Cache entries and fallback slots are keyed by request identity: the URL
//! for GET, the URL plus a canonical serialization of the body for POST.
//! These tests pin down the properties the stores rely on:
//!
//! - Logically identical bodies produce identical keys, whatever the JSON
//!   object key order
//! - Different parameters, methods, or verbs produce different keys
//! - The canonical form cannot be forged through crafted string content

use mockito::Server;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use vigil_core::fetch::{request_key, HttpClient, HttpConfig, Poller, RequestShape};

#[test]
fn test_object_key_order_is_canonicalized() {
    let one = RequestShape::Post(json!({"method": "getBalance", "params": ["alice"], "id": 9}));
    let two = RequestShape::Post(json!({"id": 9, "params": ["alice"], "method": "getBalance"}));

    assert_eq!(
        request_key("http://node/rpc", &one),
        request_key("http://node/rpc", &two)
    );
}

#[test]
fn test_nested_objects_are_canonicalized_too() {
    let one = RequestShape::Post(json!({
        "method": "getBlock",
        "params": [310, {"encoding": "json", "rewards": true}],
    }));
    let two = RequestShape::Post(json!({
        "params": [310, {"rewards": true, "encoding": "json"}],
        "method": "getBlock",
    }));

    assert_eq!(
        request_key("http://node/rpc", &one),
        request_key("http://node/rpc", &two)
    );
}

#[test]
fn test_array_order_still_matters() {
    let one = RequestShape::Post(json!({"params": [1, 2]}));
    let two = RequestShape::Post(json!({"params": [2, 1]}));

    assert_ne!(
        request_key("http://node/rpc", &one),
        request_key("http://node/rpc", &two)
    );
}

#[test]
fn test_get_and_post_identities_never_collide() {
    let get = request_key("http://node/rpc", &RequestShape::Get);
    let post = request_key("http://node/rpc", &RequestShape::Post(json!({})));

    assert_ne!(get, post);
}

#[test]
fn test_parameters_distinguish_identities() {
    let alice = RequestShape::Post(json!({"method": "getBalance", "params": ["alice"]}));
    let bob = RequestShape::Post(json!({"method": "getBalance", "params": ["bob"]}));
    let other_method = RequestShape::Post(json!({"method": "getStake", "params": ["alice"]}));

    let key_alice = request_key("http://node/rpc", &alice);
    assert_ne!(key_alice, request_key("http://node/rpc", &bob));
    assert_ne!(key_alice, request_key("http://node/rpc", &other_method));
    assert_ne!(
        key_alice,
        request_key("http://other-node/rpc", &alice)
    );
}

#[test]
fn test_crafted_strings_cannot_forge_identities() {
    // A string containing JSON syntax must not collide with the structure
    // it imitates.
    let structured = RequestShape::Post(json!({"a": {"b": 1}}));
    let forged = RequestShape::Post(json!({"a": "{\"b\":1}"}));

    assert_ne!(
        request_key("http://node/rpc", &structured),
        request_key("http://node/rpc", &forged)
    );
}

#[tokio::test]
async fn test_reordered_bodies_share_one_cache_entry() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(r#"{"result": 88}"#)
        .expect(1)
        .create_async()
        .await;

    let client = Arc::new(HttpClient::new(&HttpConfig::default()).unwrap());
    let poller = Poller::new(client, 100).unwrap();
    let url = server.url();

    let first = poller
        .post_cached(
            &url,
            json!({"method": "getSlot", "params": [], "id": 1}),
            |j| j.get("result").cloned(),
            Duration::from_secs(60),
        )
        .await;
    let second = poller
        .post_cached(
            &url,
            json!({"id": 1, "params": [], "method": "getSlot"}),
            |j| j.get("result").cloned(),
            Duration::from_secs(60),
        )
        .await;

    assert_eq!(first, json!(88));
    assert_eq!(second, json!(88));
    assert_eq!(poller.timebox().len(), 1);
    mock.assert_async().await;
}
