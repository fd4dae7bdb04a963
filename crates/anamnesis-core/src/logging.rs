// ABOUTME: MCP-safe structured logging and task-scoped correlation ids.
// ABOUTME: Standard output is reserved for the tool-server transport; all logs go to stderr.

use std::fmt;
use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

/// Install a process-wide `tracing` subscriber that writes to stderr only.
/// Safe to call once at startup; a second call is a no-op (subscriber already set).
pub fn init_logging(level: &LogLevel, _mcp_server: bool) {
    let filter_str = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    // Standard output is reserved for the JSON-RPC tool-server transport: every
    // configuration writes to stderr, not just the MCP_SERVER=true path.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

tokio::task_local! {
    static CORRELATION_ID: RequestContext;
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: String,
    pub tool_name: Option<String>,
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tool_name {
            Some(tool) => write!(f, "{} ({})", self.correlation_id, tool),
            None => write!(f, "{}", self.correlation_id),
        }
    }
}

/// Generate a collision-resistant (in practice) request id of the form `req_<ts>_<rand>`.
pub fn generate_request_id() -> String {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let rand_part: u32 = rand::random();
    format!("req_{ts}_{rand_part:08x}")
}

/// Run an async block inside a scope where `current_correlation_id()` resolves to `id`.
/// Nested scopes restore the outer binding on exit, because `task_local!` scoping is
/// structural: the inner `scope` future completing hands control back to the outer one.
pub async fn with_correlation_id<F, T>(id: String, tool_name: Option<String>, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let ctx = RequestContext {
        correlation_id: id,
        tool_name,
    };
    CORRELATION_ID.scope(ctx, fut).await
}

/// Returns the correlation id bound by the innermost enclosing `with_correlation_id`
/// scope, or `None` outside of any scope.
pub fn current_correlation_id() -> Option<String> {
    CORRELATION_ID
        .try_with(|ctx| ctx.correlation_id.clone())
        .ok()
}

/// Returns the full request context (id + tool name) bound by the innermost scope.
pub fn current_request_context() -> Option<RequestContext> {
    CORRELATION_ID.try_with(|ctx| ctx.clone()).ok()
}

/// Run `fut` inside a fresh request context, guaranteeing the scope is torn down
/// even if `fut` returns an error — `task_local::scope` already does this via RAII,
/// this wrapper exists purely to pair id-generation with scope entry.
pub async fn run_with_request_context<F, T>(tool_name: Option<String>, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let id = generate_request_id();
    with_correlation_id(id, tool_name, fut).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scope_binds_and_restores_correlation_id() {
        assert_eq!(current_correlation_id(), None);

        with_correlation_id("req_outer".into(), None, async {
            assert_eq!(current_correlation_id(), Some("req_outer".to_string()));

            with_correlation_id("req_inner".into(), Some("search".into()), async {
                assert_eq!(current_correlation_id(), Some("req_inner".to_string()));
            })
            .await;

            // outer binding restored after the inner scope completes
            assert_eq!(current_correlation_id(), Some("req_outer".to_string()));
        })
        .await;

        assert_eq!(current_correlation_id(), None);
    }

    #[test]
    fn request_ids_are_prefixed_and_unique() {
        let a = generate_request_id();
        let b = generate_request_id();
        assert!(a.starts_with("req_"));
        assert_ne!(a, b);
    }
}
