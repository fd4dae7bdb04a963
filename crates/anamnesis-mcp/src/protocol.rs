// ABOUTME: MCP handshake payload shapes (`initialize` request/result) and the
// ABOUTME: fixed set of method names the server recognizes. Grounded on
// ABOUTME: codegraph-mcp/src/protocol.rs + spec.md §6.1.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "anamnesis";

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(rename = "clientInfo", default)]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    pub tools: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl InitializeResult {
    pub fn new(server_version: &str) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities { tools: HashMap::new() },
            server_info: ServerInfo { name: SERVER_NAME.to_string(), version: server_version.to_string() },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "is_false")]
    pub is_error: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ToolCallResult {
    pub fn ok(payload: &Value) -> Self {
        Self { content: vec![ToolContent { kind: "text".to_string(), text: payload.to_string() }], is_error: false }
    }

    pub fn failed(message: &str) -> Self {
        let payload = serde_json::json!({ "success": false, "error": message });
        Self { content: vec![ToolContent { kind: "text".to_string(), text: payload.to_string() }], is_error: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_result_reports_the_protocol_version() {
        let result = InitializeResult::new("0.1.0");
        assert_eq!(result.protocol_version, PROTOCOL_VERSION);
        assert_eq!(result.server_info.name, "anamnesis");
    }

    #[test]
    fn ok_result_is_not_flagged_as_error() {
        let result = ToolCallResult::ok(&serde_json::json!({"success": true}));
        assert!(!result.is_error);
    }

    #[test]
    fn failed_result_wraps_a_success_false_envelope() {
        let result = ToolCallResult::failed("boom");
        assert!(result.is_error);
        assert!(result.content[0].text.contains("\"success\":false"));
    }
}
