//! Hybrid retrieval core: tokenizer, both index adapters, fusion and the
//! report formatter.

pub mod format;
pub mod fusion;
pub mod lexical;
pub mod semantic;
pub mod tokenizer;

/// Upper bound on `k` for either index. sqlite-vec rejects larger KNN
/// requests, and it keeps `k` inside SQLite's signed `LIMIT` range.
pub const MAX_CANDIDATES: usize = 4096;

pub use format::{format_results, NO_RESULTS};
pub use fusion::{fuse, CandidateSets, FusionParams, HybridSearch};
pub use lexical::{Fts5Index, LexicalIndex};
pub use semantic::{SemanticIndex, SqliteVecIndex};
pub use tokenizer::{build_lexical_query, extract_keywords};
