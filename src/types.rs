//! Core domain types for ticketrank.
//!
//! [`TicketRecord`] is the persisted entity; [`IndexHit`],
//! [`SearchCandidate`] and [`RankedResult`] are created fresh for every
//! query and never stored.

use serde::{Deserialize, Serialize};

/// Stable integer key of a support ticket.
pub type TicketId = i64;

// ---------------------------------------------------------------------------
// TicketRecord
// ---------------------------------------------------------------------------

/// A historical ticket as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub ticket_id: TicketId,
    pub subject: String,
    /// Generated short summary; may be empty.
    #[serde(default)]
    pub summary: String,
    /// Raw description text, kept for lexical matching.
    #[serde(default)]
    pub description: String,
    /// Dense vector of the index's fixed dimension.
    pub embedding: Vec<f32>,
}

impl TicketRecord {
    /// Text the lexical index tokenizes for this ticket.
    ///
    /// Empty parts are skipped so a ticket without a summary does not
    /// contribute stray separators.
    pub fn lexical_document(&self) -> String {
        [
            self.subject.as_str(),
            self.description.as_str(),
            self.summary.as_str(),
        ]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
    }
}

// ---------------------------------------------------------------------------
// RawTicket
// ---------------------------------------------------------------------------

/// A ticket as delivered by the helpdesk export or an ingestion file.
///
/// Helpdesk exports carry the description under one of several field
/// names; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTicket {
    pub id: TicketId,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_text: Option<String>,
    #[serde(default)]
    pub structured_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl RawTicket {
    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }

    /// First non-empty description field, in helpdesk export priority order.
    pub fn description(&self) -> Option<&str> {
        [
            self.description.as_deref(),
            self.description_text.as_deref(),
            self.structured_description.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|d| !d.is_empty())
    }

    /// Description if there is one, otherwise the subject.
    pub fn content(&self) -> &str {
        self.description().unwrap_or_else(|| self.subject())
    }
}

// ---------------------------------------------------------------------------
// Retrieval results
// ---------------------------------------------------------------------------

/// One row returned by either the semantic or the lexical index.
///
/// `score` is cosine similarity for semantic hits and the scaled lexical
/// rank for keyword hits; the two scales are only comparable after fusion
/// weighting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexHit {
    pub ticket_id: TicketId,
    pub subject: String,
    pub summary: String,
    pub score: f64,
}

/// A ticket in the fused candidate set, with per-side and combined scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchCandidate {
    pub ticket_id: TicketId,
    pub subject: String,
    pub summary: String,
    /// Cosine similarity; 0 if absent from semantic results.
    pub semantic_score: f64,
    /// Scaled lexical rank; 0 if absent from lexical results.
    pub keyword_score: f64,
    pub combined_score: f64,
}

/// Fused candidates ordered by descending `combined_score`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RankedResult {
    candidates: Vec<SearchCandidate>,
}

impl RankedResult {
    /// Wrap an already ordered and truncated candidate list.
    pub(crate) fn from_ordered(candidates: Vec<SearchCandidate>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[SearchCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchCandidate> {
        self.candidates.iter()
    }

    pub fn ticket_ids(&self) -> Vec<TicketId> {
        self.candidates.iter().map(|c| c.ticket_id).collect()
    }

    pub fn into_vec(self) -> Vec<SearchCandidate> {
        self.candidates
    }
}

impl<'a> IntoIterator for &'a RankedResult {
    type Item = &'a SearchCandidate;
    type IntoIter = std::slice::Iter<'a, SearchCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
