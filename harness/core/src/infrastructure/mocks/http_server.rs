// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mock HTTP Server
//!
//! Answers outbound HTTP calls made while evaluating policies with configured
//! canned responses. Binds an ephemeral loopback port and serves every path
//! through a single fallback handler.
//!
//! ## Matching
//! Mocks are tried in registration order and the first match wins. A mock
//! matches when all of these hold:
//! - its method (if set) equals the request method, ignoring case
//! - its URL is contained in the request URL, or contains it, or is contained
//!   in the request path
//! - every header in its request matcher equals the request header
//! - its body pattern (if set) is a substring of the request body
//!
//! The URL test is coarse: short mock URLs can match requests
//! they were not written for. Register more specific mocks first.
//!
//! Unmatched requests get `404` with `{"error": "No mock found for request"}`.

use axum::{
    body::{Body, Bytes},
    extract::{OriginalUri, State},
    http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::domain::mock::{HttpCallMock, HttpMockResponse, MockError};

pub const NO_MOCK_BODY: &str = r#"{"error": "No mock found for request"}"#;

type SharedMocks = Arc<RwLock<Vec<HttpCallMock>>>;

pub struct MockHttpServer {
    addr: SocketAddr,
    mocks: SharedMocks,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    server_handle: Mutex<Option<AbortHandle>>,
}

impl MockHttpServer {
    /// Bind an ephemeral loopback port and start serving `mocks`.
    pub async fn start(mocks: Vec<HttpCallMock>) -> Result<Self, MockError> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(MockError::ServerStart)?;
        let addr = listener.local_addr().map_err(MockError::ServerStart)?;

        let mocks: SharedMocks = Arc::new(RwLock::new(mocks));
        let app = Router::new()
            .fallback(handle_request)
            .with_state(mocks.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                error!("Mock HTTP server error: {}", e);
            }
        });

        info!(%addr, mocks = mocks.read().len(), "Mock HTTP server listening");

        Ok(Self {
            addr,
            mocks,
            shutdown: Mutex::new(Some(shutdown_tx)),
            server_handle: Mutex::new(Some(handle.abort_handle())),
        })
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Register another mock on the running server. It is tried after all
    /// existing mocks.
    pub fn add_mock(&self, mock: HttpCallMock) {
        self.mocks.write().push(mock);
    }

    pub fn mock_count(&self) -> usize {
        self.mocks.read().len()
    }

    pub fn is_running(&self) -> bool {
        self.server_handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stop serving and release the port. Safe to call more than once.
    pub fn close(&self) {
        if let Some(tx) = self.shutdown.lock().take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.lock().take() {
            handle.abort();
            debug!(addr = %self.addr, "Mock HTTP server stopped");
        }
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        self.close();
    }
}

async fn handle_request(
    State(mocks): State<SharedMocks>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = IncomingRequest {
        method: &method,
        uri: &uri,
        headers: &headers,
        body: &body,
    };

    let matched = {
        let mocks = mocks.read();
        mocks
            .iter()
            .find(|mock| request.matches(mock))
            .map(|mock| mock.response.clone())
    };

    match matched {
        Some(response) => {
            debug!(%method, %uri, status = response.status, "Mock HTTP request matched");
            render_response(&response)
        }
        None => {
            debug!(%method, %uri, "No mock found for HTTP request");
            (
                StatusCode::NOT_FOUND,
                [(CONTENT_TYPE, "application/json")],
                NO_MOCK_BODY,
            )
                .into_response()
        }
    }
}

/// Borrowed view of a request. The body is a shared buffer, so inspecting it
/// leaves it intact for anything else reading the request.
struct IncomingRequest<'a> {
    method: &'a Method,
    uri: &'a Uri,
    headers: &'a HeaderMap,
    body: &'a Bytes,
}

impl IncomingRequest<'_> {
    fn matches(&self, mock: &HttpCallMock) -> bool {
        if let Some(method) = mock.method.as_deref().filter(|m| !m.is_empty()) {
            if !method.eq_ignore_ascii_case(self.method.as_str()) {
                return false;
            }
        }

        let full_url = self.uri.to_string();
        let url_matches = full_url.contains(&mock.url)
            || mock.url.contains(&full_url)
            || self.uri.path().contains(&mock.url);
        if !url_matches {
            return false;
        }

        let Some(matcher) = &mock.request_matcher else {
            return true;
        };

        // A missing header reads as empty
        for (name, expected) in &matcher.headers {
            let actual = self
                .headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if actual != expected.as_str() {
                return false;
            }
        }

        if let Some(pattern) = matcher.body_pattern.as_deref().filter(|p| !p.is_empty()) {
            if !String::from_utf8_lossy(self.body).contains(pattern) {
                return false;
            }
        }

        true
    }
}

fn render_response(response: &HttpMockResponse) -> Response {
    let status = match response.status {
        0 => StatusCode::OK,
        code => match StatusCode::from_u16(code) {
            Ok(status) => status,
            Err(_) => {
                warn!(code, "Mock response has an invalid status code");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
    };

    let mut builder = axum::http::Response::builder().status(status);
    let mut has_content_type = false;
    for (name, value) in &response.headers {
        has_content_type |= name.eq_ignore_ascii_case(CONTENT_TYPE.as_str());
        builder = builder.header(name.as_str(), value.as_str());
    }
    if !has_content_type {
        builder = builder.header(CONTENT_TYPE, "application/json");
    }

    builder
        .body(Body::from(response.body.clone()))
        .unwrap_or_else(|e| {
            warn!("Mock response could not be built: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mock::RequestMatcher;
    use std::collections::BTreeMap;

    fn mock(url: &str, method: Option<&str>) -> HttpCallMock {
        HttpCallMock {
            url: url.to_string(),
            method: method.map(str::to_string),
            request_matcher: None,
            response: HttpMockResponse::default(),
        }
    }

    fn request_matches(mock: &HttpCallMock, method: Method, uri: &str, headers: HeaderMap, body: &str) -> bool {
        let uri: Uri = uri.parse().unwrap();
        let body = Bytes::from(body.to_string());
        IncomingRequest {
            method: &method,
            uri: &uri,
            headers: &headers,
            body: &body,
        }
        .matches(mock)
    }

    #[test]
    fn test_url_containment_either_direction() {
        let full = mock("https://images.example.com/verify", None);
        assert!(request_matches(&full, Method::GET, "/verify", HeaderMap::new(), ""));

        let short = mock("/verify", None);
        assert!(request_matches(&short, Method::GET, "/verify?image=nginx", HeaderMap::new(), ""));
        assert!(!request_matches(&short, Method::GET, "/other", HeaderMap::new(), ""));
    }

    #[test]
    fn test_method_is_case_insensitive() {
        let m = mock("/validate", Some("post"));
        assert!(request_matches(&m, Method::POST, "/validate", HeaderMap::new(), ""));
        assert!(!request_matches(&m, Method::GET, "/validate", HeaderMap::new(), ""));
    }

    #[test]
    fn test_request_matcher_headers_and_body() {
        let mut m = mock("/scan", Some("POST"));
        m.request_matcher = Some(RequestMatcher {
            headers: BTreeMap::from([("x-api-key".to_string(), "secret".to_string())]),
            body_pattern: Some("nginx".to_string()),
        });

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "secret".parse().unwrap());
        assert!(request_matches(&m, Method::POST, "/scan", headers.clone(), r#"{"image":"nginx:1.25"}"#));
        assert!(!request_matches(&m, Method::POST, "/scan", headers, r#"{"image":"redis"}"#));
        assert!(!request_matches(&m, Method::POST, "/scan", HeaderMap::new(), r#"{"image":"nginx"}"#));
    }

    #[test]
    fn test_render_defaults() {
        let response = render_response(&HttpMockResponse::default());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let custom = render_response(&HttpMockResponse {
            status: 201,
            headers: BTreeMap::from([("Content-Type".to_string(), "text/plain".to_string())]),
            body: "ok".to_string(),
        });
        assert_eq!(custom.status(), StatusCode::CREATED);
        assert_eq!(custom.headers()[CONTENT_TYPE], "text/plain");
    }
}
