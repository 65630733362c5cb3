//! End-to-end handling of one incoming helpdesk ticket.
//!
//! search report -> (triage + drafted reply) -> public note.
//!
//! Drafting and posting are optional: without a generator the outcome
//! carries only the report, and nothing is posted unless a reply exists
//! and `helpdesk.post_replies` is on.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::helpdesk::FreshdeskClient;
use crate::reply::{ReplyDrafter, TicketTriage};
use crate::search::format::format_results;
use crate::service::{TicketSearchService, SEARCH_ERROR_PREFIX};
use crate::types::TicketId;

pub const NO_DESCRIPTION: &str = "No description";

/// Result of [`Workflow::handle_ticket`].
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub ticket_id: TicketId,
    pub report: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triage: Option<TicketTriage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_id: Option<i64>,
    pub processed_at: String,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    service: TicketSearchService,
    drafter: Option<Arc<ReplyDrafter>>,
    helpdesk: Option<Arc<FreshdeskClient>>,
    post_replies: bool,
}

impl Workflow {
    pub fn new(service: TicketSearchService) -> Self {
        Self {
            service,
            drafter: None,
            helpdesk: None,
            post_replies: false,
        }
    }

    pub fn with_drafter(mut self, drafter: Option<Arc<ReplyDrafter>>) -> Self {
        self.drafter = drafter;
        self
    }

    pub fn with_helpdesk(mut self, helpdesk: Option<Arc<FreshdeskClient>>, post_replies: bool) -> Self {
        self.helpdesk = helpdesk;
        self.post_replies = post_replies;
        self
    }

    pub fn service(&self) -> &TicketSearchService {
        &self.service
    }

    /// Description to search with: the helpdesk copy when it can be
    /// fetched, else the payload's `description`, else [`NO_DESCRIPTION`].
    pub fn resolve_description(&self, ticket_id: TicketId, payload: &Value) -> String {
        if let Some(helpdesk) = &self.helpdesk {
            match helpdesk.get_ticket(ticket_id) {
                Ok(ticket) => {
                    return ticket
                        .description_text()
                        .unwrap_or(NO_DESCRIPTION)
                        .to_string()
                }
                Err(e) => tracing::warn!(ticket_id, error = %e, "could not fetch ticket"),
            }
        }
        payload
            .get("description")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(NO_DESCRIPTION)
            .to_string()
    }

    pub fn handle_ticket(&self, ticket_id: TicketId, description: &str) -> Result<WorkflowOutcome> {
        tracing::info!(ticket_id, chars = description.len(), "processing ticket");

        let (report, found) = match self.service.search(description) {
            Ok(ranked) => (format_results(&ranked), !ranked.is_empty()),
            Err(e) => (format!("{SEARCH_ERROR_PREFIX}{e}"), false),
        };

        // Nothing to ground a reply in unless similar tickets were found.
        let (triage, reply) = match &self.drafter {
            Some(drafter) if found => {
                let triage = drafter
                    .triage(description)
                    .inspect_err(|e| tracing::warn!(ticket_id, error = %e, "triage failed"))
                    .ok();
                let input = match &triage {
                    Some(t) => format!("{report}\n\nContext Analysis:\n{}", t.render()),
                    None => report.clone(),
                };
                (triage, Some(drafter.draft_reply(&input)?))
            }
            _ => (None, None),
        };

        let note_id = match (&self.helpdesk, &reply) {
            (Some(helpdesk), Some(reply)) if self.post_replies => {
                Some(helpdesk.add_public_note(ticket_id, reply)?.id)
            }
            _ => None,
        };

        tracing::info!(
            ticket_id,
            found,
            drafted = reply.is_some(),
            posted = note_id.is_some(),
            "ticket processed"
        );
        Ok(WorkflowOutcome {
            ticket_id,
            report,
            triage,
            reply,
            note_id,
            processed_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Ticket id from a webhook payload: `ticket_id`, then
/// `freshdesk_webhook.ticket_id`, then `id`. Accepts numbers and numeric
/// strings; zero and empty values are skipped.
pub fn webhook_ticket_id(payload: &Value) -> Option<TicketId> {
    let as_id = |v: Option<&Value>| -> Option<TicketId> {
        let id = match v? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        id.filter(|id| *id != 0)
    };
    as_id(payload.get("ticket_id"))
        .or_else(|| as_id(payload.pointer("/freshdesk_webhook/ticket_id")))
        .or_else(|| as_id(payload.get("id")))
}
