//! Error types for ticketrank.
//!
//! The retrieval core has three error kinds of its own:
//! [`ProviderError`] (embedding / generation collaborators), [`IndexError`]
//! (semantic or lexical backend) and [`RetrievalError`], the aggregate the
//! fusion engine surfaces when either side of a query fails. The keyword
//! tokenizer has no error type at all.
//!
//! Everything outside the core (storage plumbing, config, I/O, servers)
//! reports through [`TicketRankError`].

use std::fmt;

// ---------------------------------------------------------------------------
// Retrieval side
// ---------------------------------------------------------------------------

/// Which half of a hybrid query an error or result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSide {
    Semantic,
    Lexical,
}

impl RetrievalSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Lexical => "lexical",
        }
    }
}

impl fmt::Display for RetrievalSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProviderError
// ---------------------------------------------------------------------------

/// Failure of an external model provider (embeddings or text generation).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Network failure, timeout, or TLS problem talking to the provider.
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status (auth, rate limit, ...).
    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider answered, but not in the shape we expect.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The provider produced a vector of the wrong length.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider cannot be used at all (missing credentials, model load failure).
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// IndexError
// ---------------------------------------------------------------------------

/// Failure of the semantic or lexical index backend.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Storage engine error, including `SQLITE_BUSY` after the busy timeout.
    #[error("index query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Query vector length does not match the dimension the index was built with.
    #[error("query vector has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

// ---------------------------------------------------------------------------
// RetrievalError
// ---------------------------------------------------------------------------

/// Aggregate error for a hybrid query: wraps the first failing sub-retrieval.
///
/// Sub-retrievals are checked in order: query embedding, semantic index,
/// lexical index.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("query embedding failed: {0}")]
    Embedding(#[source] ProviderError),

    #[error("{side} retrieval failed: {source}")]
    Index {
        side: RetrievalSide,
        #[source]
        source: IndexError,
    },
}

impl RetrievalError {
    /// The side of the query that failed. Embedding failures belong to the
    /// semantic side since only the semantic index consumes the vector.
    pub fn side(&self) -> RetrievalSide {
        match self {
            Self::Embedding(_) => RetrievalSide::Semantic,
            Self::Index { side, .. } => *side,
        }
    }
}

// ---------------------------------------------------------------------------
// Crate-wide error
// ---------------------------------------------------------------------------

/// Top-level error for storage, configuration, and server plumbing.
#[derive(Debug, thiserror::Error)]
pub enum TicketRankError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("ticket #{ticket_id}: {message}")]
    Ticket { ticket_id: i64, message: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TicketRankError>;
