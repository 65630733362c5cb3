//! Semantic index: k-nearest tickets by cosine distance over embeddings.
//!
//! Backed by a sqlite-vec `vec0` table declared with
//! `distance_metric=cosine`. Rows come back in ascending distance order and
//! are converted to `similarity = 1 - distance` (not clamped).
//!
//! vec0 accepts only a bare `ORDER BY distance` on a KNN scan, so the scan
//! is materialized before the join and the id tie-break.

use std::sync::{Arc, Mutex};

use rusqlite::params;
use zerocopy::IntoBytes;

use crate::db::store::TicketStore;
use crate::error::IndexError;
use crate::search::MAX_CANDIDATES;
use crate::types::IndexHit;

/// Nearest-neighbour lookup over ticket embeddings.
pub trait SemanticIndex: Send + Sync {
    /// Dimension of the vectors this index holds.
    fn dimension(&self) -> usize;

    /// Up to `k` tickets ordered by descending similarity. An empty corpus
    /// yields an empty vector, not an error.
    fn nearest(&self, query_vector: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError>;
}

const KNN_SQL: &str = "\
WITH knn AS MATERIALIZED (
  SELECT ticket_id, distance
  FROM vec_tickets
  WHERE embedding MATCH ?1 AND k = ?2
)
SELECT knn.ticket_id, knn.distance, t.subject, t.summary
FROM knn
JOIN tickets t ON t.ticket_id = knn.ticket_id
ORDER BY knn.distance, knn.ticket_id";

/// [`SemanticIndex`] over the `vec_tickets` table of a [`TicketStore`].
#[derive(Debug, Clone)]
pub struct SqliteVecIndex {
    store: Arc<Mutex<TicketStore>>,
    dimension: usize,
}

impl SqliteVecIndex {
    pub fn new(store: Arc<Mutex<TicketStore>>) -> Self {
        let dimension = store.lock().unwrap_or_else(|e| e.into_inner()).dimension();
        Self { store, dimension }
    }
}

impl SemanticIndex for SqliteVecIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn nearest(&self, query_vector: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError> {
        if query_vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let k = k.min(MAX_CANDIDATES);

        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = store.conn.prepare_cached(KNN_SQL)?;
        let rows = stmt.query_map(params![query_vector.as_bytes(), k as i64], |row| {
            let distance: f64 = row.get(1)?;
            Ok(IndexHit {
                ticket_id: row.get(0)?,
                subject: row.get(2)?,
                summary: row.get(3)?,
                score: 1.0 - distance,
            })
        })?;

        let hits = rows.collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(k, hits = hits.len(), "semantic lookup");
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
