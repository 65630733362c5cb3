//! HTTP intake: health check, JSON search, helpdesk webhook, and the MCP
//! streamable HTTP endpoint at `/mcp`.
//!
//! Usage: `ticketrank serve --http 0.0.0.0:8000`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::mcp::TicketRankServer;
use crate::app::App;
use crate::observability::{preview, redact_secrets};
use crate::search::format::format_results;
use crate::types::RankedResult;
use crate::workflow::webhook_ticket_id;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: RankedResult,
    pub report: String,
}

type ApiError = (StatusCode, Json<Value>);

/// How long shutdown waits for acknowledged webhook tickets.
pub const WEBHOOK_DRAIN_GRACE: Duration = Duration::from_secs(30);
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Webhook tickets acknowledged to the caller but not yet processed.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicUsize>);

/// Held by one background ticket; releases its slot on drop, panics included.
#[derive(Debug)]
pub struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl InFlight {
    pub fn enter(&self) -> InFlightGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(&self.0))
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Wait until nothing is in flight or `grace` runs out. Returns the
    /// number of tickets still pending.
    pub async fn drain(&self, grace: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let pending = self.count();
            if pending == 0 || tokio::time::Instant::now() >= deadline {
                return pending;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }
}

#[derive(Clone)]
struct HttpState {
    app: App,
    in_flight: InFlight,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({ "status": "error", "message": message.into() })),
    )
}

async fn root() -> Json<Value> {
    Json(json!({ "status": "online" }))
}

async fn search(
    State(state): State<HttpState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let service = state.app.service().clone();
    let query = request.query;
    let ranked = tokio::task::spawn_blocking({
        let query = query.clone();
        move || service.search(&query)
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(|e| api_error(StatusCode::BAD_GATEWAY, format!("Error searching tickets: {e}")))?;

    Ok(Json(SearchResponse {
        report: format_results(&ranked),
        query,
        results: ranked,
    }))
}

/// Helpdesk webhook. Answers immediately; the ticket is processed on the
/// blocking pool.
async fn webhook(State(state): State<HttpState>, body: Bytes) -> Json<Value> {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "webhook body is not JSON");
            return Json(json!({ "status": "error", "message": e.to_string() }));
        }
    };
    tracing::info!(
        payload = %preview(&redact_secrets(&payload.to_string()), 500),
        "webhook received"
    );

    let Some(ticket_id) = webhook_ticket_id(&payload) else {
        tracing::error!("no ticket_id found in payload");
        return Json(json!({ "status": "error", "message": "Missing ticket_id" }));
    };

    let workflow = state.app.workflow();
    let slot = state.in_flight.enter();
    tokio::task::spawn_blocking(move || {
        let _slot = slot;
        let description = workflow.resolve_description(ticket_id, &payload);
        match workflow.handle_ticket(ticket_id, &description) {
            Ok(outcome) => tracing::info!(
                ticket_id,
                drafted = outcome.reply.is_some(),
                note_id = outcome.note_id,
                "completed ticket"
            ),
            Err(e) => tracing::error!(ticket_id, error = %e, "error processing ticket"),
        }
    });

    Json(json!({ "status": "success", "ticket_id": ticket_id }))
}

/// All routes, including `/mcp`.
pub fn router(app: App) -> Router {
    router_with(app, InFlight::default())
}

/// [`router`] reporting background webhook work to `in_flight`.
pub fn router_with(app: App, in_flight: InFlight) -> Router {
    let mcp_server = TicketRankServer::new(app.clone());
    let mcp = StreamableHttpService::new(
        move || Ok(mcp_server.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    Router::new()
        .route("/", get(root))
        .route("/search", post(search))
        .route("/webhook", post(webhook))
        .nest_service("/mcp", mcp)
        .with_state(HttpState { app, in_flight })
}

/// Serve [`router`] on `addr` until Ctrl-C, then give acknowledged webhook
/// tickets up to [`WEBHOOK_DRAIN_GRACE`] to finish.
pub async fn run_http_server(app: App, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let in_flight = InFlight::default();

    tracing::info!("ticketrank listening on http://{}", addr);
    eprintln!("ticketrank listening on http://{addr} (MCP at /mcp)");

    axum::serve(listener, router_with(app, in_flight.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down HTTP server");
        })
        .await?;

    let pending = in_flight.count();
    if pending > 0 {
        tracing::info!(pending, "waiting for webhook tickets to finish");
        let left = in_flight.drain(WEBHOOK_DRAIN_GRACE).await;
        if left > 0 {
            tracing::warn!(left, "shutting down with webhook tickets unprocessed");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_release_their_slot() {
        let in_flight = InFlight::default();
        let a = in_flight.enter();
        let b = in_flight.enter();
        assert_eq!(in_flight.count(), 2);
        drop(a);
        assert_eq!(in_flight.count(), 1);
        drop(b);
        assert_eq!(in_flight.count(), 0);
    }

    #[tokio::test]
    async fn drain_reports_what_is_left_after_grace() {
        let in_flight = InFlight::default();
        let held = in_flight.enter();
        assert_eq!(in_flight.drain(Duration::from_millis(20)).await, 1);

        let release = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            drop(held);
        });
        assert_eq!(in_flight.drain(Duration::from_secs(5)).await, 0);
        release.join().unwrap();
    }
}
