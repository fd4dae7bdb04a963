// ABOUTME: JSON-RPC 2.0 message shapes for the line-delimited stdio transport.
// ABOUTME: Grounded on codegraph-mcp/src/message.rs, trimmed to the request/
// ABOUTME: response/notification shapes the tool-server actually needs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type RequestId = Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcInbound {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: JsonRpcVersion,
    pub id: RequestId,
    #[serde(flatten)]
    pub result: JsonRpcResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResult {
    Success { result: Value },
    Error { error: JsonRpcError },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Always serializes/deserializes as the literal string `"2.0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s != "2.0" {
            return Err(serde::de::Error::custom(format!("unsupported jsonrpc version: {s}")));
        }
        Ok(JsonRpcVersion)
    }
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self { jsonrpc: JsonRpcVersion, id, result: JsonRpcResult::Success { result } }
    }

    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self { jsonrpc: JsonRpcVersion, id, result: JsonRpcResult::Error { error } }
    }
}

impl JsonRpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub fn parse_error() -> Self {
        Self { code: Self::PARSE_ERROR, message: "Parse error".to_string(), data: None }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self { code: Self::METHOD_NOT_FOUND, message: format!("Method not found: {method}"), data: None }
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self { code: Self::INVALID_PARAMS, message: format!("Invalid params: {}", detail.into()), data: None }
    }

    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self { code: Self::INTERNAL_ERROR, message: detail.into(), data: None }
    }
}
