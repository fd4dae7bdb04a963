pub mod error;
pub mod message;
pub mod protocol;
pub mod server;
pub mod tools;

pub use error::{McpError, Result};
pub use server::McpServer;
