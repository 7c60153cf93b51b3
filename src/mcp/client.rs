// ABOUTME: JSON-RPC client for the remote tool server with lazy initialize handshake
// ABOUTME: Allocates monotonic request ids and normalizes tool results to plain strings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

//! # Tool Server Client
//!
//! [`McpClient`] speaks JSON-RPC 2.0 over HTTP POST to a single endpoint.
//! The `initialize` handshake is performed lazily before the first real
//! request and never repeated for the lifetime of the client. Request ids
//! are strictly increasing integers starting at 1, shared across all methods.
//!
//! `tools/call` never surfaces tool-level failures as `Err`: a JSON-RPC error
//! object is folded into an `"Error: {message}"` string so the model can read
//! and react to it. Only transport failures (connect, timeout, HTTP status,
//! malformed body) become [`AppError`]s.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::constants::{markers, protocol};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};

/// Service name used in transport error messages
const SERVICE: &str = "tool server";

/// Tool metadata returned by `tools/list`
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteToolInfo {
    /// Tool name as registered on the server
    pub name: String,
    /// Human-readable tool description
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the tool's arguments
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Option<Value>,
}

/// JSON-RPC client for the remote MCP tool server
pub struct McpClient {
    endpoint: Url,
    http: reqwest::Client,
    next_id: AtomicI64,
    // Guards the lazy handshake so concurrent first calls initialize once.
    initialized: tokio::sync::Mutex<bool>,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl McpClient {
    /// Create a client for the given tool server endpoint
    ///
    /// # Errors
    ///
    /// Returns a config error if the HTTP client cannot be constructed.
    pub fn new(endpoint: Url) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(protocol::REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            http,
            next_id: AtomicI64::new(0),
            initialized: tokio::sync::Mutex::new(false),
        })
    }

    /// Endpoint this client talks to
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Allocate the next request id (1, 2, 3, ...)
    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// POST a JSON-RPC request and parse the response envelope
    async fn send_request(&self, method: &str, params: Value) -> AppResult<JsonRpcResponse> {
        let request = JsonRpcRequest::new(method, params, self.allocate_id());
        debug!(method, id = request.id, "sending JSON-RPC request");

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::external_service(
                SERVICE,
                format!("HTTP {status} from {method}"),
            ));
        }

        response
            .json::<JsonRpcResponse>()
            .await
            .map_err(|e| AppError::serialization(format!("invalid JSON-RPC response: {e}")))
    }

    /// Run the `initialize` handshake exactly once
    ///
    /// Handshake failures are returned to the caller and the client stays
    /// uninitialized, so the next call retries.
    async fn ensure_initialized(&self) -> AppResult<()> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return Ok(());
        }

        let params = json!({
            "protocolVersion": protocol::VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": protocol::CLIENT_NAME,
                "version": protocol::CLIENT_VERSION,
            },
        });
        let response = self.send_request("initialize", params).await?;
        if let Some(error) = response.error {
            return Err(AppError::external_service(
                SERVICE,
                format!("initialize failed: {}", error.message),
            ));
        }

        debug!("tool server handshake complete");
        *initialized = true;
        Ok(())
    }

    /// List the tools the server exposes
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a JSON-RPC error response.
    #[instrument(skip(self))]
    pub async fn list_tools(&self) -> AppResult<Vec<RemoteToolInfo>> {
        self.ensure_initialized().await?;

        let response = self.send_request("tools/list", json!({})).await?;
        if let Some(error) = response.error {
            return Err(AppError::external_service(
                SERVICE,
                format!("tools/list failed: {}", error.message),
            ));
        }

        let result = response
            .result
            .ok_or_else(|| AppError::serialization("tools/list response missing result"))?;
        let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(tools)
            .map_err(|e| AppError::serialization(format!("invalid tools/list payload: {e}")))
    }

    /// Invoke a tool and return its textual result
    ///
    /// A JSON-RPC error response is normalized into `"Error: {message}"`
    /// rather than an `Err` — the text goes back to the model, which decides
    /// how to proceed. A result with no content yields a fixed sentinel.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures: connection refused,
    /// timeout, non-2xx HTTP status or an unparsable body.
    #[instrument(skip(self, arguments), fields(tool = name))]
    pub async fn call_tool(&self, name: &str, arguments: Value) -> AppResult<String> {
        self.ensure_initialized().await?;

        let params = json!({"name": name, "arguments": arguments});
        let response = self.send_request("tools/call", params).await?;

        if let Some(error) = response.error {
            warn!(tool = name, code = error.code, "tool returned an error");
            return Ok(format!("Error: {}", error.message));
        }

        let result = response
            .result
            .ok_or_else(|| AppError::serialization("tools/call response missing result"))?;
        Ok(extract_text_content(&result))
    }
}

/// Pull the first text block out of a `tools/call` result
///
/// The server replies with `{"content": [{"type": "text", "text": ...}]}`.
/// Anything missing or empty collapses to the no-content sentinel.
fn extract_text_content(result: &Value) -> String {
    result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
        .map_or_else(|| markers::NO_CONTENT_RESULT.to_owned(), str::to_owned)
}

/// Map a reqwest failure to an error with an operator-actionable message
fn classify_transport_error(error: reqwest::Error) -> AppError {
    if error.is_timeout() {
        AppError::new(
            ErrorCode::ExternalServiceUnavailable,
            format!(
                "{SERVICE} request timed out after {}s",
                protocol::REQUEST_TIMEOUT_SECS
            ),
        )
        .with_source(error)
    } else if error.is_connect() {
        AppError::new(
            ErrorCode::ExternalServiceUnavailable,
            format!("could not connect to {SERVICE}"),
        )
        .with_source(error)
    } else {
        AppError::external_service(SERVICE, error.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_id_allocation_starts_at_one() {
        let client = McpClient::new(Url::parse("http://localhost:8000/mcp").unwrap()).unwrap();
        assert_eq!(client.allocate_id(), 1);
        assert_eq!(client.allocate_id(), 2);
        assert_eq!(client.allocate_id(), 3);
    }

    #[test]
    fn test_extract_text_content() {
        let result = json!({"content": [{"type": "text", "text": "Product: Monitor"}]});
        assert_eq!(extract_text_content(&result), "Product: Monitor");
    }

    #[test]
    fn test_extract_text_content_empty() {
        assert_eq!(
            extract_text_content(&json!({"content": []})),
            markers::NO_CONTENT_RESULT
        );
        assert_eq!(extract_text_content(&json!({})), markers::NO_CONTENT_RESULT);
    }
}
