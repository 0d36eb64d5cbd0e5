// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mock HTTP server exercised over real sockets.

use std::collections::BTreeMap;
use tandem_core::domain::mock::{HttpCallMock, HttpMockResponse, MockConfig, RequestMatcher};
use tandem_core::infrastructure::mocks::{MockHttpServer, MockResolver};

fn validate_mock() -> HttpCallMock {
    HttpCallMock {
        url: "/validate".to_string(),
        method: Some("POST".to_string()),
        request_matcher: None,
        response: HttpMockResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: r#"{"valid":true}"#.to_string(),
        },
    }
}

#[tokio::test]
async fn test_registered_mock_answers() {
    let server = MockHttpServer::start(vec![validate_mock()]).await.unwrap();
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/validate", server.url()))
        .body(r#"{"image":"nginx"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.text().await.unwrap(), r#"{"valid":true}"#);

    server.close();
}

#[tokio::test]
async fn test_unmatched_requests_get_404() {
    let server = MockHttpServer::start(vec![validate_mock()]).await.unwrap();
    let client = reqwest::Client::new();

    let response = client.get(format!("{}/unknown", server.url())).send().await.unwrap();
    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No mock found for request");

    // Method mismatch on a known path
    let response = client.get(format!("{}/validate", server.url())).send().await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_first_registered_match_wins_and_mocks_can_be_added() {
    let mut scan = validate_mock();
    scan.url = "/scan".to_string();
    scan.request_matcher = Some(RequestMatcher {
        headers: BTreeMap::from([("x-tenant".to_string(), "blue".to_string())]),
        body_pattern: None,
    });
    scan.response.body = "blue".to_string();
    let server = MockHttpServer::start(vec![scan]).await.unwrap();

    let mut fallback = validate_mock();
    fallback.url = "/scan".to_string();
    fallback.response.status = 202;
    fallback.response.body = "any".to_string();
    server.add_mock(fallback);
    assert_eq!(server.mock_count(), 2);

    let client = reqwest::Client::new();
    let blue = client
        .post(format!("{}/scan", server.url()))
        .header("x-tenant", "blue")
        .send()
        .await
        .unwrap();
    assert_eq!(blue.text().await.unwrap(), "blue");

    let other = client.post(format!("{}/scan", server.url())).send().await.unwrap();
    assert_eq!(other.status(), 202);
    assert_eq!(other.text().await.unwrap(), "any");
}

#[tokio::test]
async fn test_concurrent_requests() {
    let server = MockHttpServer::start(vec![validate_mock()]).await.unwrap();
    let client = reqwest::Client::new();
    let url = format!("{}/validate", server.url());

    let responses = futures::future::join_all((0..16).map(|_| client.post(&url).send())).await;
    assert!(responses.into_iter().all(|r| r.unwrap().status() == 200));
}

#[tokio::test]
async fn test_resolver_owns_the_server_lifecycle() {
    let resolver = MockResolver::new(MockConfig {
        http_calls: vec![validate_mock()],
        ..MockConfig::default()
    })
    .await
    .unwrap();

    let url = resolver.http_server_url().unwrap();
    assert!(url.starts_with("http://127.0.0.1:"));
    assert!(resolver.http_server().unwrap().is_running());

    resolver.close();
    resolver.close();
    let mut refused = false;
    for _ in 0..40 {
        // Fresh client each time so no pooled connection is reused
        let attempt = reqwest::Client::new()
            .post(format!("{url}/validate"))
            .timeout(std::time::Duration::from_secs(1))
            .send()
            .await;
        if attempt.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    assert!(refused);
}
