//! MCP server exposing ticket retrieval as tools.
//!
//! Four tools: `search_similar_tickets`, `extract_keywords`, `get_ticket`
//! and `analyze_ticket`, plus one `ticketrank://stats` resource.

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    Annotated, CallToolRequestParams, CallToolResult, ListResourcesResult, ListToolsResult,
    PaginatedRequestParams, RawResource, ReadResourceRequestParams, ReadResourceResult,
    ResourceContents, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{tool, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};
use serde::Deserialize;

use super::{json_text, run_blocking};
use crate::app::App;
use crate::search::tokenizer::extract_keywords;
use crate::types::{TicketId, TicketRecord};

const STATS_URI: &str = "ticketrank://stats";

#[derive(Clone, Debug)]
pub struct TicketRankServer {
    app: App,
}

impl TicketRankServer {
    pub fn new(app: App) -> Self {
        Self { app }
    }

    /// Body of the stats resource. Store access runs on the blocking pool.
    async fn read_stats(&self) -> Result<ReadResourceResult, McpError> {
        let app = self.app.clone();
        let stats = tokio::task::spawn_blocking(move || app.stats())
            .await
            .map_err(|e| McpError::internal_error(format!("background task failed: {e}"), None))?
            .map_err(|e| {
                McpError::internal_error(format!("Failed to read index stats: {e}"), None)
            })?;
        let json = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "embedder": self.app.embedder().name(),
            "tickets": stats.tickets,
            "embeddings": stats.embeddings,
            "dimension": stats.dimension,
        });
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(json_text(&json), STATS_URI)],
        })
    }
}

fn render_local(record: &TicketRecord) -> String {
    format!(
        "Ticket #{}\nSubject: {}\nSummary: {}\nDescription: {}\n",
        record.ticket_id,
        record.subject,
        if record.summary.is_empty() { "N/A" } else { &record.summary },
        if record.description.is_empty() { "N/A" } else { &record.description },
    )
}

// ---------------------------------------------------------------------------
// Tool parameter structs
// ---------------------------------------------------------------------------

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct QueryParams {
    #[schemars(description = "Free-text description of the customer's problem")]
    pub query: String,
}

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct TicketIdParams {
    #[schemars(description = "Helpdesk ticket id")]
    pub ticket_id: TicketId,
}

#[derive(Deserialize, schemars::JsonSchema)]
pub(crate) struct AnalyzeParams {
    #[schemars(description = "Ticket subject and description to triage")]
    pub ticket_text: String,
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

#[tool_router]
impl TicketRankServer {
    #[tool(
        name = "search_similar_tickets",
        description = "Find past support tickets similar to a problem description. Combines embedding similarity with keyword matching and returns up to five tickets with their semantic, keyword and combined scores."
    )]
    async fn search_similar_tickets(&self, Parameters(p): Parameters<QueryParams>) -> String {
        let service = self.app.service().clone();
        run_blocking(move || service.report(&p.query)).await
    }

    #[tool(
        name = "extract_keywords",
        description = "Show the keywords a query contributes to the lexical side of the search (stopwords and short words removed, at most ten)."
    )]
    async fn extract_keywords(&self, Parameters(p): Parameters<QueryParams>) -> String {
        json_text(&extract_keywords(&p.query))
    }

    #[tool(
        name = "get_ticket",
        description = "Fetch one ticket by id: from the helpdesk when it is configured, otherwise from the local index."
    )]
    async fn get_ticket(&self, Parameters(p): Parameters<TicketIdParams>) -> String {
        let app = self.app.clone();
        run_blocking(move || match app.helpdesk() {
            Some(helpdesk) => match helpdesk.get_ticket(p.ticket_id) {
                Ok(ticket) => ticket.render(),
                Err(e) => format!("Error fetching ticket: {e}"),
            },
            None => {
                let store = app.store().lock().unwrap_or_else(|e| e.into_inner());
                match store.get_ticket(p.ticket_id) {
                    Ok(Some(record)) => render_local(&record),
                    Ok(None) => format!("Ticket #{} is not in the index.", p.ticket_id),
                    Err(e) => format!("Error fetching ticket: {e}"),
                }
            }
        })
        .await
    }

    #[tool(
        name = "analyze_ticket",
        description = "Triage a ticket: issue category, urgency, customer sentiment and a one-sentence problem statement. Needs text generation to be enabled."
    )]
    async fn analyze_ticket(&self, Parameters(p): Parameters<AnalyzeParams>) -> String {
        let app = self.app.clone();
        run_blocking(move || match app.drafter() {
            Some(drafter) => match drafter.triage(&p.ticket_text) {
                Ok(triage) => triage.render(),
                Err(e) => format!("Error analyzing context: {e}"),
            },
            None => "Ticket analysis is unavailable: set generation.enabled and an API key.".into(),
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// ServerHandler
// ---------------------------------------------------------------------------

impl ServerHandler for TicketRankServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "ticketrank: retrieval over past support tickets. Use search_similar_tickets \
                 with the customer's problem description to find how similar issues were \
                 handled before."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: rmcp::model::Implementation {
                name: "ticketrank".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        let resources = vec![Annotated::new(
            RawResource {
                uri: STATS_URI.into(),
                name: "Index Stats".into(),
                title: None,
                description: Some("Ticket and embedding counts, and the pinned dimension.".into()),
                mime_type: Some("application/json".into()),
                size: None,
                icons: None,
                meta: None,
            },
            None,
        )];
        std::future::ready(Ok(ListResourcesResult {
            meta: None,
            next_cursor: None,
            resources,
        }))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            match request.uri.as_str() {
                STATS_URI => self.read_stats().await,
                uri => Err(McpError::resource_not_found(
                    format!("Unknown resource: {uri}"),
                    None,
                )),
            }
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: Self::tool_router().list_all(),
        }))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool_context = rmcp::handler::server::tool::ToolCallContext::new(self, request, context);
        Self::tool_router().call(tool_context).await
    }
}

/// Serve MCP over stdin/stdout until the client disconnects.
pub async fn run_stdio_server(app: App) -> Result<(), Box<dyn std::error::Error>> {
    let server = TicketRankServer::new(app);
    let transport = rmcp::transport::io::stdio();
    let running = server.serve(transport).await.inspect_err(|e| {
        tracing::error!("MCP server error: {}", e);
    })?;
    let _ = running.waiting().await;
    Ok(())
}
