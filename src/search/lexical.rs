//! Lexical index: disjunctive keyword match ranked by FTS5 BM25.
//!
//! FTS5's `bm25()` is negative (more negative is better) and unbounded.
//! The adapter flips the sign and squashes it into `[0, scale)` with
//! `scale * s / (1 + s)`. With the default scale of 0.1 that is the band
//! PostgreSQL `ts_rank` occupies for unweighted documents, which is what
//! the default fusion weights were calibrated against.

use std::sync::{Arc, Mutex};

use rusqlite::params;

use crate::db::store::TicketStore;
use crate::error::IndexError;
use crate::search::MAX_CANDIDATES;
use crate::types::IndexHit;

/// Default upper bound of the scaled lexical rank.
pub const DEFAULT_RANK_SCALE: f64 = 0.1;

/// Full-text relevance lookup over ticket lexical documents.
pub trait LexicalIndex: Send + Sync {
    /// Up to `k` tickets matching any term of `or_expression`, ordered by
    /// descending rank. An empty expression matches nothing.
    fn lexical_rank(&self, or_expression: &str, k: usize) -> Result<Vec<IndexHit>, IndexError>;
}

const FTS_RANK_SQL: &str = "\
SELECT t.ticket_id, t.subject, t.summary, bm25(fts_tickets) AS bm25_score
FROM fts_tickets
JOIN tickets t ON t.ticket_id = fts_tickets.rowid
WHERE fts_tickets MATCH ?1
ORDER BY bm25_score, t.ticket_id
LIMIT ?2";

/// Map a raw BM25 value onto `[0, scale)`, monotone in relevance.
pub fn scale_bm25(bm25: f64, scale: f64) -> f64 {
    let s = (-bm25).max(0.0);
    scale * s / (1.0 + s)
}

/// [`LexicalIndex`] over the `fts_tickets` table of a [`TicketStore`].
#[derive(Debug, Clone)]
pub struct Fts5Index {
    store: Arc<Mutex<TicketStore>>,
    rank_scale: f64,
}

impl Fts5Index {
    pub fn new(store: Arc<Mutex<TicketStore>>) -> Self {
        Self {
            store,
            rank_scale: DEFAULT_RANK_SCALE,
        }
    }

    pub fn with_rank_scale(mut self, rank_scale: f64) -> Self {
        self.rank_scale = rank_scale;
        self
    }
}

impl LexicalIndex for Fts5Index {
    fn lexical_rank(&self, or_expression: &str, k: usize) -> Result<Vec<IndexHit>, IndexError> {
        if or_expression.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let k = k.min(MAX_CANDIDATES);

        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = store.conn.prepare_cached(FTS_RANK_SQL)?;
        let rows = stmt.query_map(params![or_expression, k as i64], |row| {
            let bm25: f64 = row.get(3)?;
            Ok(IndexHit {
                ticket_id: row.get(0)?,
                subject: row.get(1)?,
                summary: row.get(2)?,
                score: scale_bm25(bm25, self.rank_scale),
            })
        })?;

        let hits = rows.collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(query = or_expression, k, hits = hits.len(), "lexical lookup");
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
