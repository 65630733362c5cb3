//! Freshdesk v2 REST client.
//!
//! Authenticates with HTTP basic auth (`api_key:X`). Only the three calls
//! the workflow needs: fetch one ticket, list tickets, add a public note.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::schema::HelpdeskConfig;
use crate::error::ProviderError;
use crate::http_client::{build_client, read_json};
use crate::types::{RawTicket, TicketId};

/// Page size for `list_tickets`; Freshdesk's maximum.
const PAGE_SIZE: usize = 100;

/// A ticket as returned by `GET /api/v2/tickets/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelpdeskTicket {
    pub id: TicketId,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_text: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl HelpdeskTicket {
    /// Plain-text description, falling back to the HTML one.
    pub fn description_text(&self) -> Option<&str> {
        [self.description_text.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|d| !d.is_empty())
    }

    /// Multi-line summary for agents and tool output.
    pub fn render(&self) -> String {
        let or_na = |v: Option<String>| v.unwrap_or_else(|| "N/A".to_string());
        format!(
            "Ticket #{}\nSubject: {}\nDescription: {}\nStatus: {}\nPriority: {}\nCreated: {}\n",
            self.id,
            or_na(self.subject.clone()),
            or_na(self.description_text().map(str::to_string)),
            or_na(self.status.map(|s| s.to_string())),
            or_na(self.priority.map(|p| p.to_string())),
            or_na(self.created_at.clone()),
        )
    }

    pub fn into_raw(self) -> RawTicket {
        RawTicket {
            id: self.id,
            subject: self.subject,
            description: self.description,
            description_text: self.description_text,
            ..RawTicket::default()
        }
    }
}

/// What Freshdesk reports back after creating a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteReceipt {
    pub id: i64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub private: bool,
}

pub struct FreshdeskClient {
    client: Client,
    domain: String,
    api_key: String,
}

impl std::fmt::Debug for FreshdeskClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshdeskClient")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl FreshdeskClient {
    pub fn new(domain: &str, api_key: String, timeout_ms: u64) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout_ms)?,
            domain: domain.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build from config. `Ok(None)` when no domain is configured.
    pub fn from_config<F>(config: &HelpdeskConfig, lookup: F) -> Result<Option<Self>, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(domain) = config.domain.as_deref().filter(|d| !d.trim().is_empty()) else {
            return Ok(None);
        };
        let api_key = lookup(&config.api_key_env)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Unavailable(format!(
                    "helpdesk domain is set but {} is not",
                    config.api_key_env
                ))
            })?;
        Ok(Some(Self::new(domain, api_key, config.timeout_ms)?))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2/{path}", self.domain)
    }

    pub fn get_ticket(&self, ticket_id: TicketId) -> Result<HelpdeskTicket, ProviderError> {
        let response = self
            .client
            .get(self.url(&format!("tickets/{ticket_id}")))
            .basic_auth(&self.api_key, Some("X"))
            .send()?;
        let json = read_json(response)?;
        serde_json::from_value(json)
            .map_err(|e| ProviderError::InvalidResponse(format!("ticket #{ticket_id}: {e}")))
    }

    /// First page of tickets, as ingestion input.
    pub fn list_tickets(&self) -> Result<Vec<RawTicket>, ProviderError> {
        let response = self
            .client
            .get(self.url(&format!("tickets?per_page={PAGE_SIZE}")))
            .basic_auth(&self.api_key, Some("X"))
            .send()?;
        let json = read_json(response)?;
        serde_json::from_value(json)
            .map_err(|e| ProviderError::InvalidResponse(format!("ticket list: {e}")))
    }

    /// Post a note visible to the customer.
    pub fn add_public_note(&self, ticket_id: TicketId, body: &str) -> Result<NoteReceipt, ProviderError> {
        let response = self
            .client
            .post(self.url(&format!("tickets/{ticket_id}/notes")))
            .basic_auth(&self.api_key, Some("X"))
            .json(&json!({ "body": body, "private": false }))
            .send()?;
        let json = read_json(response)?;
        let receipt: NoteReceipt = serde_json::from_value(json)
            .map_err(|e| ProviderError::InvalidResponse(format!("note receipt: {e}")))?;
        tracing::info!(
            ticket_id,
            note_id = receipt.id,
            private = receipt.private,
            "public note created"
        );
        Ok(receipt)
    }
}
