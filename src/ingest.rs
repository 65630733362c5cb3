//! Ingestion: raw helpdesk tickets to stored [`TicketRecord`]s.
//!
//! For each ticket the pipeline picks a description, decides a summary,
//! embeds the summary (unless an embedding is supplied) and upserts the
//! record. Provider failures are per-ticket: they are logged, counted and
//! skipped. Storage failures abort the run.

use std::path::Path;

use serde::Serialize;

use crate::db::store::{TicketStore, UpsertOutcome};
use crate::embedding::EmbeddingProvider;
use crate::error::{ProviderError, Result, TicketRankError};
use crate::types::{RawTicket, TicketId, TicketRecord};

/// Descriptions at or below this many characters are not worth summarizing.
pub const MIN_SUMMARIZE_CHARS: usize = 10;

/// Turns a ticket description into a short summary.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, description: &str) -> std::result::Result<String, ProviderError>;
}

/// Outcome counts for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub total: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// `(ticket_id, error)` for every failed ticket.
    pub failures: Vec<(TicketId, String)>,
}

impl IngestReport {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Fallback summary when no summarizer output is available.
pub fn fallback_summary(subject: &str) -> String {
    let subject = subject.trim();
    if subject.is_empty() {
        "Ticket about: Unknown".to_string()
    } else {
        format!("Ticket about: {subject}")
    }
}

pub struct IngestPipeline<'a> {
    store: &'a TicketStore,
    embedder: &'a dyn EmbeddingProvider,
    summarizer: Option<&'a dyn Summarizer>,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(store: &'a TicketStore, embedder: &'a dyn EmbeddingProvider) -> Self {
        Self {
            store,
            embedder,
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: &'a dyn Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    fn summary_for(&self, raw: &RawTicket) -> std::result::Result<String, ProviderError> {
        if let Some(summary) = raw.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return Ok(summary.to_string());
        }
        let content = raw.content();
        match self.summarizer {
            Some(summarizer) if content.chars().count() > MIN_SUMMARIZE_CHARS => {
                let summary = summarizer.summarize(content)?;
                let summary = summary.trim();
                if summary.is_empty() {
                    Ok(fallback_summary(raw.subject()))
                } else {
                    Ok(summary.to_string())
                }
            }
            _ => Ok(fallback_summary(raw.subject())),
        }
    }

    /// Build the record for one raw ticket without storing it.
    pub fn prepare(&self, raw: &RawTicket) -> std::result::Result<TicketRecord, ProviderError> {
        let summary = self.summary_for(raw)?;
        let embedding = match &raw.embedding {
            Some(provided) => {
                if provided.len() != self.store.dimension() {
                    return Err(ProviderError::DimensionMismatch {
                        expected: self.store.dimension(),
                        actual: provided.len(),
                    });
                }
                provided.clone()
            }
            None => self.embedder.embed(&summary)?,
        };
        Ok(TicketRecord {
            ticket_id: raw.id,
            subject: raw.subject().trim().to_string(),
            summary,
            description: raw.description().unwrap_or_default().to_string(),
            embedding,
        })
    }

    /// Ingest one ticket. Provider errors come back as `Ok(Err(..))`.
    fn ingest_one(
        &self,
        raw: &RawTicket,
    ) -> Result<std::result::Result<UpsertOutcome, ProviderError>> {
        let record = match self.prepare(raw) {
            Ok(record) => record,
            Err(e) => return Ok(Err(e)),
        };
        Ok(Ok(self.store.upsert_ticket(&record)?))
    }

    pub fn ingest(&self, tickets: &[RawTicket]) -> Result<IngestReport> {
        self.ingest_with_progress(tickets, |_| {})
    }

    /// Ingest every ticket, calling `on_progress` after each one.
    pub fn ingest_with_progress<F>(&self, tickets: &[RawTicket], mut on_progress: F) -> Result<IngestReport>
    where
        F: FnMut(&RawTicket),
    {
        let mut report = IngestReport {
            total: tickets.len(),
            ..IngestReport::default()
        };

        for raw in tickets {
            match self.ingest_one(raw)? {
                Ok(outcome) => {
                    tracing::debug!(ticket_id = raw.id, ?outcome, "ticket ingested");
                    report.record(outcome);
                }
                Err(e) => {
                    tracing::warn!(ticket_id = raw.id, error = %e, "skipping ticket");
                    report.failed += 1;
                    report.failures.push((raw.id, e.to_string()));
                }
            }
            on_progress(raw);
        }

        tracing::info!(
            total = report.total,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed,
            "ingestion finished"
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Ticket files
// ---------------------------------------------------------------------------

/// Read tickets from a JSON file: either an array, or `{"tickets": [..]}`.
pub fn load_tickets_file(path: &Path) -> Result<Vec<RawTicket>> {
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let array = match value {
        serde_json::Value::Object(mut map) => map.remove("tickets").ok_or_else(|| {
            TicketRankError::Other(format!(
                "{}: expected a JSON array or an object with a \"tickets\" array",
                path.display()
            ))
        })?,
        other => other,
    };
    Ok(serde_json::from_value(array)?)
}

/// Write tickets as a pretty-printed JSON array.
pub fn save_tickets_file(path: &Path, tickets: &[RawTicket]) -> Result<()> {
    let json = serde_json::to_string_pretty(tickets)?;
    std::fs::write(path, json)?;
    Ok(())
}
