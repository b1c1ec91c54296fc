//! Request/response transport to the bot API.
//!
//! `ApiTransport` is the seam between commands/loaders and the network so
//! both can be exercised against `MockTransport` in tests.

use crate::credentials::{ApiKey, API_KEY_HEADER};
use crate::error::{GatewayError, GatewayResult};
use botdeck_cache::BoxFuture;
use parking_lot::Mutex;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One request/response call to the API.
pub trait ApiTransport: Send + Sync {
    /// Send a request and return the parsed JSON body of a 2xx response.
    ///
    /// An empty 2xx body is returned as `Value::Null`.
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> BoxFuture<'_, GatewayResult<Value>>;
}

/// Arc wrapper for transport trait objects.
pub type DynTransport = Arc<dyn ApiTransport>;

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: Option<ApiKey>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, api_key: Option<ApiKey>) -> GatewayResult<Self> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: Option<ApiKey>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> GatewayResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "API request");

        let mut request = self.client.request(method.clone(), &url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key.expose());
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            warn!(%method, %url, status = status.as_u16(), "API request failed");
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| GatewayError::Json(format!("Failed to parse response from {path}: {e}")))
    }
}

impl ApiTransport for HttpTransport {
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> BoxFuture<'_, GatewayResult<Value>> {
        let path = path.to_string();
        Box::pin(async move { self.send(method, &path, body).await })
    }
}

/// Request captured by `MockTransport`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Mock transport for testing.
///
/// Answers each path with a configured response, or `{"success": true}`
/// when none is set.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Recorded requests for verification.
    requests: Mutex<Vec<RecordedRequest>>,
    /// Responses by path.
    responses: Mutex<HashMap<String, GatewayResult<Value>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response for a path.
    pub fn set_response(&self, path: impl Into<String>, response: GatewayResult<Value>) {
        self.responses.lock().insert(path.into(), response);
    }

    /// Get recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests made to a path.
    pub fn count(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.path == path).count()
    }

    /// Clear recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }
}

impl ApiTransport for MockTransport {
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> BoxFuture<'_, GatewayResult<Value>> {
        let path = path.to_string();
        Box::pin(async move {
            self.requests.lock().push(RecordedRequest {
                method,
                path: path.clone(),
                body,
            });
            self.responses
                .lock()
                .get(&path)
                .cloned()
                .unwrap_or_else(|| Ok(json!({"success": true})))
        })
    }
}
