//! Request transport
//!
//! [`DataformTools`](crate::DataformTools) builds [`ApiRequest`]s and hands
//! them to a [`Transport`]. [`HttpTransport`] talks to the REST endpoint;
//! [`MockTransport`](crate::mock::MockTransport) answers from memory.

use crate::auth::TokenSource;
use crate::error::ApiError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Default API root
pub const DEFAULT_ENDPOINT: &str = "https://dataform.googleapis.com";

/// API version prefixed to every resource path
pub const API_VERSION: &str = "v1beta1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

/// One REST call: `path` is a resource name, optionally with a custom verb
/// (`projects/p/.../workspaces/w:pull`)
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Value of a query parameter
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Sends requests and returns the decoded JSON response body
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

/// HTTPS transport using reqwest and a bearer token
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    tokens: Arc<dyn TokenSource>,
}

impl HttpTransport {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, tokens)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.endpoint, API_VERSION, path.trim_start_matches('/'))
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.url(&request.path);
        let token = self.tokens.token().await?;
        tracing::debug!(method = %request.method, %url, token_source = self.tokens.name(), "sending request");

        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        let mut builder = builder.bearer_auth(token).query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), %url, "request failed");
            return Err(ApiError::from_response(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;

    #[test]
    fn urls_include_version() {
        let transport = HttpTransport::with_endpoint("http://localhost:8080/", Arc::new(StaticToken::new("t")));
        assert_eq!(
            transport.url("projects/p/locations/l/repositories"),
            "http://localhost:8080/v1beta1/projects/p/locations/l/repositories"
        );
    }

    #[test]
    fn request_builders() {
        let request = ApiRequest::get("projects/p").with_query("pageToken", "abc");
        assert_eq!(request.query_param("pageToken"), Some("abc"));
        assert_eq!(request.query_param("missing"), None);
        assert_eq!(request.to_string(), "GET projects/p");
    }
}
