// ABOUTME: Tool-server error taxonomy. Grounded on codegraph-mcp/src/error.rs,
// ABOUTME: trimmed to the transport's actual failure modes (no websocket/url variants).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Service(#[from] anamnesis_core::error::AnamnesisError),
}

pub type Result<T> = std::result::Result<T, McpError>;
