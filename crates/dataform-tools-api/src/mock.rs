//! In-memory transport for testing
//!
//! Responses are registered per method and resource path. Each route holds a
//! queue: every request pops the front response, and the last one is
//! reused once the queue is down to one. Requests are recorded so tests can
//! assert on paths and bodies.
//!
//! ```rust,ignore
//! let mock = Arc::new(MockTransport::new());
//! mock.fail(Method::Post, "projects/p/locations/l/repositories/r/workspaces",
//!     RpcCode::AlreadyExists, "exists").await;
//! let tools = DataformTools::new("p", "l", mock.clone())?;
//! ```

use crate::error::{ApiError, RpcCode};
use crate::transport::{ApiRequest, Method, Transport};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
enum MockResponse {
    Ok(Value),
    Err { code: RpcCode, message: String },
}

/// Mock transport answering from registered responses
#[derive(Default)]
pub struct MockTransport {
    routes: Arc<RwLock<HashMap<(Method, String), VecDeque<MockResponse>>>>,
    requests: Arc<RwLock<Vec<ApiRequest>>>,
    latency_ms: u64,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency_ms`
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    async fn push(&self, method: Method, path: &str, response: MockResponse) {
        self.routes
            .write()
            .await
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }

    /// Queue a successful response
    pub async fn respond(&self, method: Method, path: &str, body: Value) {
        self.push(method, path, MockResponse::Ok(body)).await;
    }

    /// Queue an API error
    pub async fn fail(&self, method: Method, path: &str, code: RpcCode, message: &str) {
        self.push(
            method,
            path,
            MockResponse::Err {
                code,
                message: message.to_string(),
            },
        )
        .await;
    }

    /// Requests received so far, in order
    pub async fn requests(&self) -> Vec<ApiRequest> {
        self.requests.read().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        if self.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        }

        let key = (request.method, request.path.clone());
        self.requests.write().await.push(request);

        let response = {
            let mut routes = self.routes.write().await;
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match response {
            Some(MockResponse::Ok(body)) => Ok(body),
            Some(MockResponse::Err { code, message }) => Err(ApiError::rpc(code, message)),
            None => Err(ApiError::rpc(
                RpcCode::NotFound,
                format!("no mock response for {} {}", key.0, key.1),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn queued_responses_then_sticky_last() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, "a", json!({"n": 1})).await;
        mock.respond(Method::Get, "a", json!({"n": 2})).await;

        assert_eq!(mock.send(ApiRequest::get("a")).await.unwrap()["n"], 1);
        assert_eq!(mock.send(ApiRequest::get("a")).await.unwrap()["n"], 2);
        assert_eq!(mock.send(ApiRequest::get("a")).await.unwrap()["n"], 2);
        assert_eq!(mock.request_count().await, 3);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let mock = MockTransport::new().with_latency(1);
        let err = mock.send(ApiRequest::get("missing")).await.unwrap_err();

        assert_eq!(err.rpc_code(), Some(RpcCode::NotFound));
        assert!(err.to_string().contains("GET missing"));
    }
}
