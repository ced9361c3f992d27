//! Last-Known-Good Fallback Tests
//!
//! The fallback path always calls the node and never caches for freshness;
//! its only job is outage smoothing. These tests cover:
//!
//! - Serving the most recent success across an outage
//! - Independence of request identities, including POST bodies
//! - The neutral answer when nothing has ever succeeded

use mockito::{Matcher, Server};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use vigil_core::fetch::{HttpClient, HttpConfig, Poller, RequestShape};

fn create_poller() -> Poller {
    let client = Arc::new(HttpClient::new(&HttpConfig::default()).unwrap());
    Poller::new(client, 100).unwrap()
}

fn result_of(payload: &Value) -> Option<Value> {
    payload.get("result").cloned()
}

#[tokio::test]
async fn test_last_success_survives_outage() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/balance")
        .with_status(200)
        .with_body(r#"{"result": 1000}"#)
        .expect(1)
        .create_async()
        .await;

    let poller = create_poller();
    let url = format!("{}/balance", server.url());

    let live = poller.call_with_fallback(&url, RequestShape::Get, result_of).await;
    assert_eq!(live, json!(1000));
    mock.assert_async().await;

    // Everything 501s from here on; the recorded success keeps serving.
    server.reset();
    for _ in 0..3 {
        let served = poller.call_with_fallback(&url, RequestShape::Get, result_of).await;
        assert_eq!(served, json!(1000));
    }
}

#[tokio::test]
async fn test_newer_success_replaces_older_one() {
    let mut server = Server::new_async().await;
    let _first = server
        .mock("GET", "/balance")
        .with_status(200)
        .with_body(r#"{"result": 1000}"#)
        .create_async()
        .await;

    let poller = create_poller();
    let url = format!("{}/balance", server.url());
    assert_eq!(
        poller.call_with_fallback(&url, RequestShape::Get, result_of).await,
        json!(1000)
    );

    server.reset();
    let _second = server
        .mock("GET", "/balance")
        .with_status(200)
        .with_body(r#"{"result": 1250}"#)
        .create_async()
        .await;
    assert_eq!(
        poller.call_with_fallback(&url, RequestShape::Get, result_of).await,
        json!(1250)
    );

    server.reset();
    assert_eq!(
        poller.call_with_fallback(&url, RequestShape::Get, result_of).await,
        json!(1250)
    );
}

#[tokio::test]
async fn test_identities_fail_independently() {
    let mut server = Server::new_async().await;
    let _healthy = server
        .mock("GET", "/a")
        .with_status(200)
        .with_body(r#"{"result": 7}"#)
        .create_async()
        .await;
    let _broken = server
        .mock("GET", "/b")
        .with_status(500)
        .create_async()
        .await;

    let poller = create_poller();
    let url_a = format!("{}/a", server.url());
    let url_b = format!("{}/b", server.url());

    assert_eq!(
        poller.call_with_fallback(&url_a, RequestShape::Get, result_of).await,
        json!(7)
    );
    assert_eq!(
        poller.call_with_fallback(&url_b, RequestShape::Get, result_of).await,
        Value::Null
    );

    server.reset();

    // Only the endpoint that ever succeeded has something to fall back to.
    assert_eq!(
        poller.call_with_fallback(&url_a, RequestShape::Get, result_of).await,
        json!(7)
    );
    assert_eq!(
        poller.call_with_fallback(&url_b, RequestShape::Get, result_of).await,
        Value::Null
    );
}

#[tokio::test]
async fn test_post_bodies_keep_separate_fallback_slots() {
    let mut server = Server::new_async().await;
    let _alice = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"params": ["alice"]})))
        .with_status(200)
        .with_body(r#"{"result": 100}"#)
        .create_async()
        .await;
    let _bob = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"params": ["bob"]})))
        .with_status(200)
        .with_body(r#"{"result": 200}"#)
        .create_async()
        .await;

    let poller = create_poller();
    let url = server.url();
    let alice_body = json!({"method": "getBalance", "params": ["alice"]});
    let bob_body = json!({"method": "getBalance", "params": ["bob"]});

    assert_eq!(
        poller
            .call_with_fallback(&url, RequestShape::Post(alice_body.clone()), result_of)
            .await,
        json!(100)
    );
    assert_eq!(
        poller
            .call_with_fallback(&url, RequestShape::Post(bob_body.clone()), result_of)
            .await,
        json!(200)
    );

    server.reset();

    assert_eq!(
        poller
            .call_with_fallback(&url, RequestShape::Post(alice_body), result_of)
            .await,
        json!(100)
    );
    assert_eq!(
        poller
            .call_with_fallback(&url, RequestShape::Post(bob_body), result_of)
            .await,
        json!(200)
    );
}

#[tokio::test]
async fn test_transport_failures_fall_back_like_http_errors() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/slow")
        .with_status(200)
        .with_body(r#"{"result": 42}"#)
        .create_async()
        .await;

    let config = HttpConfig {
        request_timeout_ms: 200,
        ..HttpConfig::default()
    };
    let client = Arc::new(HttpClient::new(&config).unwrap());
    let poller = Poller::new(client, 100).unwrap();
    let url = format!("{}/slow", server.url());

    assert_eq!(
        poller.call_with_fallback(&url, RequestShape::Get, result_of).await,
        json!(42)
    );

    // Dropping the server closes the listener, so the next call dies at
    // connect rather than with an HTTP status. Same fallback either way.
    drop(server);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        poller.call_with_fallback(&url, RequestShape::Get, result_of).await,
        json!(42)
    );
}
