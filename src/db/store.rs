//! SQLite CRUD layer for ticket records.
//!
//! Every query goes through [`Connection::prepare_cached`], so statements
//! are compiled once per connection and reused afterwards.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use zerocopy::IntoBytes;

use crate::db::schema::{initialize_database, stored_dimension, SchemaOptions};
use crate::error::{Result, TicketRankError};
use crate::types::{TicketId, TicketRecord};

// ---------------------------------------------------------------------------
// StoreStats
// ---------------------------------------------------------------------------

/// Aggregate statistics about the stored corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub tickets: usize,
    pub embeddings: usize,
    pub dimension: usize,
}

/// What an upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Same content hash as the stored row; nothing was written.
    Unchanged,
}

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

const UPSERT_TICKET_SQL: &str = "\
INSERT INTO tickets (ticket_id, subject, summary, description, lexical_document, content_hash, ingested_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT(ticket_id) DO UPDATE SET
  subject = excluded.subject,
  summary = excluded.summary,
  description = excluded.description,
  lexical_document = excluded.lexical_document,
  content_hash = excluded.content_hash,
  ingested_at = excluded.ingested_at";

// vec0 has no UPSERT; replace the row inside the same transaction.
const DELETE_VECTOR_SQL: &str = "DELETE FROM vec_tickets WHERE ticket_id = ?1";
const INSERT_VECTOR_SQL: &str = "INSERT INTO vec_tickets (ticket_id, embedding) VALUES (?1, ?2)";

const GET_HASH_SQL: &str = "SELECT content_hash FROM tickets WHERE ticket_id = ?1";

const GET_TICKET_SQL: &str = "\
SELECT t.ticket_id, t.subject, t.summary, t.description, v.embedding
FROM tickets t
LEFT JOIN vec_tickets v ON v.ticket_id = t.ticket_id
WHERE t.ticket_id = ?1";

const DELETE_TICKET_SQL: &str = "DELETE FROM tickets WHERE ticket_id = ?1";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Stable fingerprint of everything an upsert writes.
fn content_hash(record: &TicketRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.ticket_id.to_le_bytes());
    for part in [&record.subject, &record.summary, &record.description] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hasher.update(record.embedding.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Decode a vec0 float32 blob.
fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

// ---------------------------------------------------------------------------
// TicketStore
// ---------------------------------------------------------------------------

/// Typed CRUD wrapper around the ticket database.
pub struct TicketStore {
    pub conn: Connection,
    dimension: usize,
}

impl std::fmt::Debug for TicketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketStore")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl TicketStore {
    /// Open (or create) the database at `db_path` with the full schema.
    pub fn open(db_path: &str, options: &SchemaOptions) -> Result<Self> {
        let conn = initialize_database(db_path, options)?;
        Ok(Self {
            conn,
            dimension: options.dimension,
        })
    }

    /// In-memory store, mostly for tests.
    pub fn in_memory(dimension: usize) -> Result<Self> {
        Self::open(":memory:", &SchemaOptions::new(dimension))
    }

    /// Wrap a connection that already has the schema applied.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let dimension = stored_dimension(&conn)?.ok_or_else(|| {
            TicketRankError::Config("database has no pinned embedding dimension".into())
        })?;
        Ok(Self { conn, dimension })
    }

    /// Embedding dimension this store accepts.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    // -------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------

    /// Insert or update a ticket and its embedding atomically.
    ///
    /// Idempotent: re-upserting an identical record writes nothing.
    pub fn upsert_ticket(&self, record: &TicketRecord) -> Result<UpsertOutcome> {
        if record.embedding.len() != self.dimension {
            return Err(TicketRankError::Ticket {
                ticket_id: record.ticket_id,
                message: format!(
                    "embedding has dimension {}, store expects {}",
                    record.embedding.len(),
                    self.dimension
                ),
            });
        }

        let hash = content_hash(record);
        let tx = self.conn.unchecked_transaction()?;
        let previous: Option<String> = {
            let mut stmt = tx.prepare_cached(GET_HASH_SQL)?;
            stmt.query_row(params![record.ticket_id], |row| row.get(0))
                .optional()?
        };
        if previous.as_deref() == Some(hash.as_str()) {
            return Ok(UpsertOutcome::Unchanged);
        }

        {
            let mut stmt = tx.prepare_cached(UPSERT_TICKET_SQL)?;
            stmt.execute(params![
                record.ticket_id,
                record.subject,
                record.summary,
                record.description,
                record.lexical_document(),
                hash,
                Utc::now().to_rfc3339(),
            ])?;
            tx.prepare_cached(DELETE_VECTOR_SQL)?
                .execute(params![record.ticket_id])?;
            tx.prepare_cached(INSERT_VECTOR_SQL)?
                .execute(params![record.ticket_id, record.embedding.as_bytes()])?;
        }
        tx.commit()?;

        Ok(if previous.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    /// Remove a ticket from every structure. Returns whether it existed.
    pub fn delete_ticket(&self, ticket_id: TicketId) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx
            .prepare_cached(DELETE_TICKET_SQL)?
            .execute(params![ticket_id])?;
        tx.prepare_cached(DELETE_VECTOR_SQL)?
            .execute(params![ticket_id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Fetch a ticket with its embedding.
    pub fn get_ticket(&self, ticket_id: TicketId) -> Result<Option<TicketRecord>> {
        let mut stmt = self.conn.prepare_cached(GET_TICKET_SQL)?;
        let record = stmt
            .query_row(params![ticket_id], |row| {
                let blob: Option<Vec<u8>> = row.get(4)?;
                Ok(TicketRecord {
                    ticket_id: row.get(0)?,
                    subject: row.get(1)?,
                    summary: row.get(2)?,
                    description: row.get(3)?,
                    embedding: blob.as_deref().map(blob_to_vector).unwrap_or_default(),
                })
            })
            .optional()?;
        Ok(record)
    }

    pub fn get_ticket_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tickets", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn get_embedding_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vec_tickets", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn get_stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            tickets: self.get_ticket_count()?,
            embeddings: self.get_embedding_count()?,
            dimension: self.dimension,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> TicketStore {
        TicketStore::in_memory(3).expect("in-memory store")
    }

    fn record(id: TicketId, subject: &str, embedding: [f32; 3]) -> TicketRecord {
        TicketRecord {
            ticket_id: id,
            subject: subject.into(),
            summary: format!("summary of {subject}"),
            description: format!("description of {subject}"),
            embedding: embedding.to_vec(),
        }
    }

    #[test]
    fn upsert_then_get_roundtrips() {
        let store = setup();
        let r = record(10, "Login loop", [1.0, 0.0, 0.5]);
        assert_eq!(store.upsert_ticket(&r).unwrap(), UpsertOutcome::Inserted);

        let back = store.get_ticket(10).unwrap().expect("ticket stored");
        assert_eq!(back, r);
    }

    #[test]
    fn reupsert_identical_is_unchanged() {
        let store = setup();
        let r = record(1, "Refund", [0.1, 0.2, 0.3]);
        store.upsert_ticket(&r).unwrap();
        assert_eq!(store.upsert_ticket(&r).unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(store.get_ticket_count().unwrap(), 1);
        assert_eq!(store.get_embedding_count().unwrap(), 1);
    }

    #[test]
    fn reupsert_changed_updates_in_place() {
        let store = setup();
        store
            .upsert_ticket(&record(1, "Refund", [0.1, 0.2, 0.3]))
            .unwrap();
        let changed = record(1, "Refund delayed", [0.3, 0.2, 0.1]);
        assert_eq!(
            store.upsert_ticket(&changed).unwrap(),
            UpsertOutcome::Updated
        );

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.tickets, 1);
        assert_eq!(stats.embeddings, 1);
        let back = store.get_ticket(1).unwrap().unwrap();
        assert_eq!(back.subject, "Refund delayed");
        assert_eq!(back.embedding, vec![0.3, 0.2, 0.1]);
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let store = setup();
        let mut r = record(5, "VPN", [1.0, 1.0, 1.0]);
        r.embedding.push(1.0);
        let err = store.upsert_ticket(&r).unwrap_err();
        assert!(matches!(err, TicketRankError::Ticket { ticket_id: 5, .. }));
        assert_eq!(store.get_ticket_count().unwrap(), 0);
    }

    #[test]
    fn delete_removes_row_and_vector() {
        let store = setup();
        store.upsert_ticket(&record(2, "Printer", [0.0, 1.0, 0.0])).unwrap();
        assert!(store.delete_ticket(2).unwrap());
        assert!(!store.delete_ticket(2).unwrap());
        assert!(store.get_ticket(2).unwrap().is_none());
        assert_eq!(store.get_embedding_count().unwrap(), 0);
    }

    #[test]
    fn from_connection_reads_pinned_dimension() {
        let conn = initialize_database(":memory:", &SchemaOptions::new(7)).unwrap();
        let store = TicketStore::from_connection(conn).unwrap();
        assert_eq!(store.dimension(), 7);
    }

    #[test]
    fn blob_decoding_matches_encoding() {
        let v = vec![1.5f32, -2.25, 0.0];
        assert_eq!(blob_to_vector(v.as_bytes()), v);
    }

    #[test]
    fn content_hash_depends_on_every_field() {
        let base = record(1, "a", [0.0, 0.0, 1.0]);
        let mut other = base.clone();
        other.summary.push('!');
        assert_ne!(content_hash(&base), content_hash(&other));
        let mut other = base.clone();
        other.embedding[0] = 0.5;
        assert_ne!(content_hash(&base), content_hash(&other));
        assert_eq!(content_hash(&base), content_hash(&base.clone()));
    }
}
