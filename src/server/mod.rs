//! Network surfaces: MCP tools (stdio or streamable HTTP) and the axum
//! intake routes.
//!
//! The core is synchronous and its HTTP collaborators use blocking
//! clients, so every handler that reaches it goes through
//! [`run_blocking`].

pub mod http;
pub mod mcp;

pub use http::{router, router_with, run_http_server, InFlight};
pub use mcp::{run_stdio_server, TicketRankServer};

/// Run `f` on the blocking pool. A panicked task becomes an error string.
pub(crate) async fn run_blocking<F>(f: F) -> String
where
    F: FnOnce() -> String + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| format!("Error: background task failed: {e}"))
}

pub(crate) fn json_text<T: serde::Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}
