//! Client side of the remote tool-provider protocol (MCP flavored
//! JSON-RPC). The core only needs three operations from the provider:
//! initialize, `tools/list`, and `tools/call`.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::ContentItem;
use crate::error::{Result, ScoutError};

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: 0,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

/// A tool as the provider declares it. Created at discovery, lives for the
/// session, never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct ListToolsResult {
    tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ContentItem>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

/// Transport over which JSON-RPC messages reach the provider.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;
    async fn close(&self) -> Result<()>;
}

/// HTTP POST transport with monotonically assigned request ids.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    request_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            request_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send(&self, mut request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        request.id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|err| ScoutError::Protocol(format!("request failed: {err}")))?;

        response
            .json()
            .await
            .map_err(|err| ScoutError::Protocol(format!("malformed response: {err}")))
    }

    async fn close(&self) -> Result<()> {
        // Nothing to tear down for plain HTTP.
        Ok(())
    }
}

/// Client for one provider connection. Owns the handshake state; the
/// session layer owns its lifetime.
pub struct McpClient<T: McpTransport> {
    transport: T,
    initialized: bool,
    closed: bool,
}

impl<T: McpTransport> McpClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            initialized: false,
            closed: false,
        }
    }

    /// Perform the initialize handshake. Idempotent per connection.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        let request = JsonRpcRequest::new(
            "initialize",
            Some(serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {
                    "name": "scout",
                    "version": env!("CARGO_PKG_VERSION"),
                }
            })),
        );
        let response = self.transport.send(request).await?;
        if let Some(error) = response.error {
            return Err(ScoutError::Protocol(format!(
                "initialize failed ({}): {}",
                error.code, error.message
            )));
        }
        self.initialized = true;

        let notification = JsonRpcRequest::new("notifications/initialized", None);
        let _ = self.transport.send(notification).await;
        Ok(())
    }

    /// Fetch the provider's current tool set. Re-issues discovery on every
    /// call; tool sets may change between calls.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        self.ensure_open()?;
        self.initialize().await?;

        let response = self
            .transport
            .send(JsonRpcRequest::new("tools/list", None))
            .await?;
        if let Some(error) = response.error {
            return Err(ScoutError::Protocol(format!(
                "tools/list failed ({}): {}",
                error.code, error.message
            )));
        }
        let result: ListToolsResult =
            serde_json::from_value(response.result.unwrap_or_default()).map_err(|err| {
                ScoutError::Protocol(format!("malformed tools/list result: {err}"))
            })?;
        Ok(result.tools)
    }

    /// Invoke one tool. Provider-declared errors surface as
    /// `ToolInvocation` so the step loop can report them without aborting.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Vec<ContentItem>> {
        self.ensure_open()?;
        self.initialize().await?;

        let request = JsonRpcRequest::new(
            "tools/call",
            Some(serde_json::json!({
                "name": name,
                "arguments": arguments,
            })),
        );
        let response = self.transport.send(request).await?;
        if let Some(error) = response.error {
            return Err(ScoutError::ToolInvocation {
                name: name.to_string(),
                source: format!("provider error ({}): {}", error.code, error.message).into(),
            });
        }
        let result: CallToolResult =
            serde_json::from_value(response.result.unwrap_or_default()).map_err(|err| {
                ScoutError::Protocol(format!("malformed tools/call result: {err}"))
            })?;
        if result.is_error {
            return Err(ScoutError::ToolInvocation {
                name: name.to_string(),
                source: ContentItem::join_text(&result.content).into(),
            });
        }
        Ok(result.content)
    }

    /// Close the underlying transport. Safe to call repeatedly and safe to
    /// call before the handshake ever ran.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transport.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ScoutError::Protocol("connection already closed".into()));
        }
        Ok(())
    }
}
