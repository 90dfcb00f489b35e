//! Wire shapes of the tool protocol.
//!
//! Engines speak JSON-RPC 2.0 over their standard streams: one message per
//! line on stdin/stdout, diagnostics on stderr. On top of the RPC envelope
//! sits a small tool vocabulary (`initialize`, `tools/list` and
//! `tools/call`) with results carrying a human-readable content array and an
//! optional machine-readable `structuredContent` payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision exchanged during `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Marker argument that tells an engine binary to serve the protocol on its
/// standard streams.
pub const SERVE_FLAG: &str = "--mcp";

/// Method names understood by every engine.
pub mod method {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

/// JSON-RPC request id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
    #[default]
    Null,
}

/// A JSON-RPC request or notification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "RequestId::is_null")]
    pub id: RequestId,
}

impl RequestId {
    fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Request {
    pub fn new(id: i64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: method.into(),
            params,
            id: RequestId::Number(id),
        }
    }

    /// A request without an id; the receiver must not respond to it.
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.into(), method: method.into(), params, id: RequestId::Null }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }
}

/// A JSON-RPC error object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Error codes used by the framework. Standard JSON-RPC codes.
pub mod error_code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// A JSON-RPC response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub id: RequestId,
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.into(), result: Some(result), error: None, id }
    }

    pub fn error(id: RequestId, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            result: None,
            error: Some(RpcError { code, message: message.into(), data: None }),
            id,
        }
    }
}

/// Identity advertised during the handshake.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

/// `initialize` request parameters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    pub client_info: Implementation,
}

/// `initialize` response payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    pub server_info: Implementation,
}

/// `tools/call` request parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// One entry of a result's `content` array. Only text blocks are produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// Result of a `tools/call`.
///
/// The first content entry is a human summary. `structured_content` mirrors
/// the returned domain object. Error results set `is_error`; a failed test
/// run is error-flagged but still carries its report as structured content.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(default, rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    /// A success result with a human summary.
    pub fn text(summary: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: summary.into() }],
            structured_content: None,
            is_error: None,
        }
    }

    /// An error-flagged result carrying `text` as its summary.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            structured_content: None,
            is_error: Some(true),
        }
    }

    /// Attaches a machine-readable payload.
    pub fn with_structured(mut self, value: Value) -> Self {
        self.structured_content = Some(value);
        self
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// The text of the first content entry, if any.
    pub fn summary(&self) -> Option<&str> {
        self.content.first().map(|ContentBlock::Text { text }| text.as_str())
    }
}

/// Descriptor returned by `tools/list`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// `tools/list` response payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_id_round_trips() {
        for raw in [json!(7), json!("abc"), json!(null)] {
            let id: RequestId = serde_json::from_value(raw.clone()).unwrap();
            assert_eq!(serde_json::to_value(&id).unwrap(), raw);
        }
    }

    #[test]
    fn notification_omits_id() {
        let req = Request::notification(method::INITIALIZED, None);
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("id").is_none());
    }

    #[test]
    fn tool_result_error_flag() {
        let ok = ToolResult::text("done");
        assert!(!ok.is_error());
        let err = ToolResult::error("Build failed: boom");
        assert!(err.is_error());
        assert_eq!(err.summary(), Some("Build failed: boom"));

        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["type"], "text");
    }

    #[test]
    fn structured_content_wire_key() {
        let result =
            ToolResult::text("ok").with_structured(json!({"name": "hello"}));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["structuredContent"]["name"], "hello");
    }
}
