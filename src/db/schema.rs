//! SQLite schema initialization for ticketrank.
//!
//! One logical corpus, three physical structures:
//! - `tickets`: the canonical rows, keyed by `ticket_id` (a rowid alias)
//! - `fts_tickets`: FTS5 external-content index over `lexical_document`
//! - `vec_tickets`: sqlite-vec `vec0` table with cosine distance
//!
//! The embedding dimension is pinned in `index_meta` the first time a
//! database is initialized. Reopening with another dimension is an error.

use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, TicketRankError};

// ---------------------------------------------------------------------------
// DDL constants
// ---------------------------------------------------------------------------

const CREATE_TICKETS: &str = "\
CREATE TABLE IF NOT EXISTS tickets (
  ticket_id INTEGER PRIMARY KEY,
  subject TEXT NOT NULL,
  summary TEXT NOT NULL DEFAULT '',
  description TEXT NOT NULL DEFAULT '',
  lexical_document TEXT NOT NULL DEFAULT '',
  content_hash TEXT NOT NULL,
  ingested_at TEXT NOT NULL
)";

const CREATE_INDEX_META: &str = "\
CREATE TABLE IF NOT EXISTS index_meta (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
)";

// FTS5 -------------------------------------------------------------------

// porter + unicode61 gives English stemming, close to a PostgreSQL
// `english` text-search configuration.
const CREATE_FTS: &str = "\
CREATE VIRTUAL TABLE IF NOT EXISTS fts_tickets USING fts5(
  lexical_document,
  content='tickets', content_rowid='ticket_id',
  tokenize='porter unicode61'
)";

const CREATE_FTS_TRIGGERS: &[&str] = &[
    "\
CREATE TRIGGER IF NOT EXISTS tickets_ai AFTER INSERT ON tickets BEGIN
  INSERT INTO fts_tickets(rowid, lexical_document)
  VALUES (new.ticket_id, new.lexical_document);
END",
    "\
CREATE TRIGGER IF NOT EXISTS tickets_ad AFTER DELETE ON tickets BEGIN
  INSERT INTO fts_tickets(fts_tickets, rowid, lexical_document)
  VALUES ('delete', old.ticket_id, old.lexical_document);
END",
    "\
CREATE TRIGGER IF NOT EXISTS tickets_au AFTER UPDATE ON tickets BEGIN
  INSERT INTO fts_tickets(fts_tickets, rowid, lexical_document)
  VALUES ('delete', old.ticket_id, old.lexical_document);
  INSERT INTO fts_tickets(rowid, lexical_document)
  VALUES (new.ticket_id, new.lexical_document);
END",
];

const DIMENSION_KEY: &str = "embedding_dimension";

/// Build the `vec0` DDL for a given dimension.
fn create_vec_sql(dimension: usize) -> String {
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS vec_tickets USING vec0(
  ticket_id INTEGER PRIMARY KEY,
  embedding float[{dimension}] distance_metric=cosine
)"
    )
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Connection-level settings applied on every open.
#[derive(Debug, Clone, Copy)]
pub struct SchemaOptions {
    /// Embedding dimension D for the `vec_tickets` table.
    pub dimension: usize,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl SchemaOptions {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            busy_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Load the `sqlite-vec` extension via `sqlite3_auto_extension`.
///
/// Must run before any connection is opened so that every new connection
/// has vec0 available. Registering more than once is harmless.
#[allow(clippy::missing_transmute_annotations)]
fn load_sqlite_vec_extension() {
    use rusqlite::ffi::sqlite3_auto_extension;
    use sqlite_vec::sqlite3_vec_init;

    unsafe {
        sqlite3_auto_extension(Some(std::mem::transmute(sqlite3_vec_init as *const ())));
    }
}

/// Read the pinned embedding dimension, if the database has one.
pub fn stored_dimension(conn: &Connection) -> Result<Option<usize>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM index_meta WHERE key = ?1",
            params![DIMENSION_KEY],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|v| {
        v.parse::<usize>().map_err(|e| {
            TicketRankError::Config(format!("corrupt {DIMENSION_KEY} '{v}' in index_meta: {e}"))
        })
    })
    .transpose()
}

/// Pin `dimension` on first use, or verify it against the pinned value.
fn ensure_dimension(conn: &Connection, dimension: usize) -> Result<()> {
    match stored_dimension(conn)? {
        Some(existing) if existing != dimension => Err(TicketRankError::Config(format!(
            "database was built with {existing}-dimensional embeddings, \
             but the configured provider produces {dimension}"
        ))),
        Some(_) => Ok(()),
        None => {
            conn.execute(
                "INSERT INTO index_meta (key, value) VALUES (?1, ?2)",
                params![DIMENSION_KEY, dimension.to_string()],
            )?;
            Ok(())
        }
    }
}

/// Open (or create) the database at `db_path` and apply the full schema.
///
/// The returned connection has WAL mode, synchronous NORMAL and the
/// configured busy timeout. Safe to call for every connection that needs
/// to read the index: all DDL is idempotent.
///
/// # Errors
///
/// Fails if the database cannot be opened, any DDL statement fails, or the
/// database already pins a different embedding dimension.
pub fn initialize_database(db_path: &str, options: &SchemaOptions) -> Result<Connection> {
    if options.dimension == 0 {
        return Err(TicketRankError::Config(
            "embedding dimension must be greater than zero".into(),
        ));
    }

    // Register the sqlite-vec auto-extension *before* opening the connection.
    load_sqlite_vec_extension();

    let conn = Connection::open(db_path)?;

    // -- Pragmas ----------------------------------------------------------
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(options.busy_timeout)?;

    // -- Core tables ------------------------------------------------------
    conn.execute_batch(CREATE_TICKETS)?;
    conn.execute_batch(CREATE_INDEX_META)?;
    ensure_dimension(&conn, options.dimension)?;

    // -- FTS5 -------------------------------------------------------------
    conn.execute_batch(CREATE_FTS)?;
    for trigger in CREATE_FTS_TRIGGERS {
        conn.execute_batch(trigger)?;
    }

    // -- sqlite-vec -------------------------------------------------------
    conn.execute_batch(&create_vec_sql(options.dimension))?;

    tracing::debug!(db_path, dimension = options.dimension, "schema ready");
    Ok(conn)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
