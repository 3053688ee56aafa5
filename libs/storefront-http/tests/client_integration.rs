#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end tests for `HttpClient` against a local mock server.

use std::time::Duration;

use bytes::Bytes;
use http::{Request, StatusCode};
use httpmock::prelude::*;
use storefront_http::{HttpClient, HttpClientConfig, HttpError, HttpTransport};

fn test_client() -> HttpClient {
    storefront_http::HttpClientBuilder::with_config(HttpClientConfig::for_testing())
        .build()
        .unwrap()
}

#[tokio::test]
async fn get_returns_buffered_body_and_status() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/tables");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"id":1},{"id":2}]"#);
    });

    let req = Request::get(server.url("/tables")).body(Bytes::new()).unwrap();
    let resp = test_client().execute(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let tables: serde_json::Value = resp.json().unwrap();
    assert_eq!(tables.as_array().map(Vec::len), Some(2));
    mock.assert();
}

#[tokio::test]
async fn non_success_status_is_not_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/orders");
        then.status(401).body("expired");
    });

    let req = Request::get(server.url("/orders")).body(Bytes::new()).unwrap();
    let resp = test_client().execute(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.text(), "expired");
}

#[tokio::test]
async fn sends_user_agent_and_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/printers")
            .header_exists("user-agent")
            .json_body(serde_json::json!({"name": "kitchen"}));
        then.status(201);
    });

    let req = Request::post(server.url("/printers"))
        .header("content-type", "application/json")
        .body(Bytes::from_static(br#"{"name":"kitchen"}"#))
        .unwrap();
    let resp = test_client().execute(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    mock.assert();
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/slow");
        then.status(200).delay(Duration::from_millis(500));
    });

    let mut cfg = HttpClientConfig::for_testing();
    cfg.request_timeout = Duration::from_millis(50);
    let client = storefront_http::HttpClientBuilder::with_config(cfg)
        .build()
        .unwrap();

    let req = Request::get(server.url("/slow")).body(Bytes::new()).unwrap();
    let err = client.execute(req).await.unwrap_err();
    assert!(matches!(err, HttpError::Timeout(_)), "got {err:?}");
    assert!(err.is_transport());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/menu");
        then.status(200).body("x".repeat(2048));
    });

    let mut cfg = HttpClientConfig::for_testing();
    cfg.max_body_size = 1024;
    let client = storefront_http::HttpClientBuilder::with_config(cfg)
        .build()
        .unwrap();

    let req = Request::get(server.url("/menu")).body(Bytes::new()).unwrap();
    let err = client.execute(req).await.unwrap_err();
    assert!(matches!(err, HttpError::BodyTooLarge { limit: 1024, .. }));
}

#[tokio::test]
async fn connection_refused_is_transport_error() {
    // Port 9 (discard) is not expected to be listening on the test host.
    let req = Request::get("http://127.0.0.1:9/orders")
        .body(Bytes::new())
        .unwrap();
    let err = test_client().execute(req).await.unwrap_err();
    assert!(err.is_transport(), "got {err:?}");
}

#[tokio::test]
async fn slow_body_counts_against_the_same_deadline() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Headers arrive within the timeout, the body only after it has passed.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        let _ = socket.write_all(b"ok").await;
    });

    let mut cfg = HttpClientConfig::for_testing();
    cfg.request_timeout = Duration::from_millis(400);
    let client = storefront_http::HttpClientBuilder::with_config(cfg)
        .build()
        .unwrap();

    let req = Request::get(format!("http://{addr}/menu"))
        .body(Bytes::new())
        .unwrap();
    let err = client.execute(req).await.unwrap_err();
    assert!(matches!(err, HttpError::Timeout(d) if d == Duration::from_millis(400)), "got {err:?}");
}
