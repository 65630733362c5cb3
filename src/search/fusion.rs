//! Score fusion: merge semantic and lexical candidates into one ranking.
//!
//! Fusion is a full outer union keyed by `ticket_id`. Each candidate gets
//!
//!   `combined = semantic * W_sem + keyword * W_kw`
//!
//! where a side the ticket did not appear on contributes 0. Candidates
//! with no positive score on either side are dropped, the rest are sorted
//! by `combined` descending (ties by `ticket_id` ascending) and truncated.
//!
//! [`HybridSearch`] drives a whole query: tokenize, then run the semantic
//! branch (embed + nearest) and the lexical branch concurrently with
//! `rayon::join`, then fuse.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::error::{RetrievalError, RetrievalSide};
use crate::search::lexical::LexicalIndex;
use crate::search::MAX_CANDIDATES;
use crate::search::semantic::SemanticIndex;
use crate::search::tokenizer::{build_lexical_query, extract_keywords};
use crate::types::{IndexHit, RankedResult, SearchCandidate, TicketId};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Weights and limits for one fused query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    pub semantic_weight: f64,
    pub keyword_weight: f64,
    /// `k` passed to the semantic index.
    pub semantic_limit: usize,
    /// `k` passed to the lexical index.
    pub lexical_limit: usize,
    /// Maximum number of fused candidates returned.
    pub result_limit: usize,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            keyword_weight: 30.0,
            semantic_limit: 10,
            lexical_limit: 10,
            result_limit: 5,
        }
    }
}

impl FusionParams {
    /// Weights must be finite and non-negative, or ranking stops being
    /// monotone in each score.
    pub fn validate(&self) -> Result<(), String> {
        for (name, weight) in [
            ("semantic_weight", self.semantic_weight),
            ("keyword_weight", self.keyword_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(format!("{name} must be finite and >= 0, got {weight}"));
            }
        }
        for (name, limit) in [
            ("semantic_limit", self.semantic_limit),
            ("lexical_limit", self.lexical_limit),
            ("result_limit", self.result_limit),
        ] {
            if limit == 0 {
                return Err(format!("{name} must be greater than zero"));
            }
            if limit > MAX_CANDIDATES {
                return Err(format!("{name} must be at most {MAX_CANDIDATES}, got {limit}"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

/// Fuse two candidate sets into a [`RankedResult`].
///
/// Descriptive fields (`subject`, `summary`) come from the semantic hit
/// when a ticket is on both sides. Pure and infallible.
pub fn fuse(semantic: &[IndexHit], lexical: &[IndexHit], params: &FusionParams) -> RankedResult {
    let mut candidates: Vec<SearchCandidate> = Vec::with_capacity(semantic.len() + lexical.len());
    let mut by_id: HashMap<TicketId, usize> = HashMap::with_capacity(candidates.capacity());

    for hit in semantic {
        // Duplicate row from the same index: keep the first (best) one.
        if by_id.contains_key(&hit.ticket_id) {
            continue;
        }
        by_id.insert(hit.ticket_id, candidates.len());
        candidates.push(SearchCandidate {
            ticket_id: hit.ticket_id,
            subject: hit.subject.clone(),
            summary: hit.summary.clone(),
            semantic_score: hit.score,
            keyword_score: 0.0,
            combined_score: 0.0,
        });
    }

    let mut seen_lexical: HashSet<TicketId> = HashSet::with_capacity(lexical.len());
    for hit in lexical {
        if !seen_lexical.insert(hit.ticket_id) {
            continue;
        }
        match by_id.get(&hit.ticket_id) {
            Some(&idx) => candidates[idx].keyword_score = hit.score,
            None => {
                by_id.insert(hit.ticket_id, candidates.len());
                candidates.push(SearchCandidate {
                    ticket_id: hit.ticket_id,
                    subject: hit.subject.clone(),
                    summary: hit.summary.clone(),
                    semantic_score: 0.0,
                    keyword_score: hit.score,
                    combined_score: 0.0,
                });
            }
        }
    }

    let mut fused: Vec<SearchCandidate> = candidates
        .into_iter()
        .filter(|c| c.semantic_score > 0.0 || c.keyword_score > 0.0)
        .map(|mut c| {
            c.combined_score =
                c.semantic_score * params.semantic_weight + c.keyword_score * params.keyword_weight;
            c
        })
        .collect();

    fused.sort_by(|a, b| {
        b.combined_score
            .total_cmp(&a.combined_score)
            .then_with(|| a.ticket_id.cmp(&b.ticket_id))
    });
    fused.truncate(params.result_limit);

    RankedResult::from_ordered(fused)
}

// ---------------------------------------------------------------------------
// HybridSearch
// ---------------------------------------------------------------------------

/// Outcome of both retrieval branches for one query, before fusion.
#[derive(Debug)]
pub struct CandidateSets {
    pub keywords: Vec<String>,
    pub lexical_query: String,
    pub semantic: Result<Vec<IndexHit>, RetrievalError>,
    pub lexical: Result<Vec<IndexHit>, RetrievalError>,
}

impl CandidateSets {
    /// Fuse both sides, or return the first failure (semantic side first,
    /// which includes the query embedding).
    pub fn into_ranked(self, params: &FusionParams) -> Result<RankedResult, RetrievalError> {
        let semantic = self.semantic?;
        let lexical = self.lexical?;
        Ok(fuse(&semantic, &lexical, params))
    }

    /// The sides that failed, in check order.
    pub fn failed_sides(&self) -> Vec<RetrievalSide> {
        let mut sides = Vec::new();
        if self.semantic.is_err() {
            sides.push(RetrievalSide::Semantic);
        }
        if self.lexical.is_err() {
            sides.push(RetrievalSide::Lexical);
        }
        sides
    }
}

/// The retrieval core: tokenizer, embedding provider, both indexes and
/// the fusion parameters.
#[derive(Clone)]
pub struct HybridSearch {
    embedder: Arc<dyn EmbeddingProvider>,
    semantic: Arc<dyn SemanticIndex>,
    lexical: Arc<dyn LexicalIndex>,
    params: FusionParams,
}

impl std::fmt::Debug for HybridSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearch")
            .field("embedder", &self.embedder.name())
            .field("dimension", &self.semantic.dimension())
            .field("params", &self.params)
            .finish()
    }
}

impl HybridSearch {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        semantic: Arc<dyn SemanticIndex>,
        lexical: Arc<dyn LexicalIndex>,
        params: FusionParams,
    ) -> Self {
        Self {
            embedder,
            semantic,
            lexical,
            params,
        }
    }

    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Run both retrieval branches and return their outcomes unfused.
    pub fn retrieve(&self, query: &str) -> CandidateSets {
        let keywords = extract_keywords(query);
        let lexical_query = build_lexical_query(&keywords);

        let (semantic, lexical) = rayon::join(
            || {
                let vector = self
                    .embedder
                    .embed(query)
                    .map_err(RetrievalError::Embedding)?;
                self.semantic
                    .nearest(&vector, self.params.semantic_limit)
                    .map_err(|source| RetrievalError::Index {
                        side: RetrievalSide::Semantic,
                        source,
                    })
            },
            || {
                self.lexical
                    .lexical_rank(&lexical_query, self.params.lexical_limit)
                    .map_err(|source| RetrievalError::Index {
                        side: RetrievalSide::Lexical,
                        source,
                    })
            },
        );

        tracing::debug!(
            keywords = keywords.len(),
            semantic_ok = semantic.is_ok(),
            lexical_ok = lexical.is_ok(),
            "retrieval branches joined"
        );

        CandidateSets {
            keywords,
            lexical_query,
            semantic,
            lexical,
        }
    }

    /// Full hybrid query. Fails if either side fails.
    pub fn search(&self, query: &str) -> Result<RankedResult, RetrievalError> {
        self.retrieve(query).into_ranked(&self.params)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::{IndexError, ProviderError};

    fn hit(id: TicketId, score: f64) -> IndexHit {
        IndexHit {
            ticket_id: id,
            subject: format!("subject {id}"),
            summary: format!("summary {id}"),
            score,
        }
    }

    fn params() -> FusionParams {
        FusionParams::default()
    }

    #[test]
    fn scenario_semantic_only_beats_lexical_only() {
        let ranked = fuse(&[hit(1, 0.95)], &[hit(2, 0.02)], &params());
        assert_eq!(ranked.ticket_ids(), vec![1, 2]);
        let c = ranked.candidates();
        assert!((c[0].combined_score - 0.665).abs() < 1e-9);
        assert!((c[1].combined_score - 0.6).abs() < 1e-9);
        assert_eq!(c[0].keyword_score, 0.0);
        assert_eq!(c[1].semantic_score, 0.0);
    }

    #[test]
    fn union_merges_scores_for_shared_tickets() {
        let ranked = fuse(&[hit(7, 0.5)], &[hit(7, 0.01)], &params());
        assert_eq!(ranked.len(), 1);
        let c = &ranked.candidates()[0];
        assert_eq!(c.semantic_score, 0.5);
        assert_eq!(c.keyword_score, 0.01);
        assert!((c.combined_score - (0.35 + 0.3)).abs() < 1e-9);
    }

    #[test]
    fn semantic_side_wins_descriptive_fields() {
        let mut lexical = hit(3, 0.05);
        lexical.subject = "lexical subject".into();
        let ranked = fuse(&[hit(3, 0.4)], &[lexical], &params());
        assert_eq!(ranked.candidates()[0].subject, "subject 3");
    }

    #[test]
    fn lexical_only_keeps_lexical_fields() {
        let mut lexical = hit(4, 0.05);
        lexical.summary = "from fts".into();
        let ranked = fuse(&[], &[lexical], &params());
        assert_eq!(ranked.candidates()[0].summary, "from fts");
    }

    #[test]
    fn non_positive_candidates_are_dropped() {
        let ranked = fuse(&[hit(1, 0.0), hit(2, -0.3), hit(3, 0.2)], &[hit(4, 0.0)], &params());
        assert_eq!(ranked.ticket_ids(), vec![3]);
    }

    #[test]
    fn truncates_to_result_limit() {
        let semantic: Vec<IndexHit> = (1..=10).map(|i| hit(i, 1.0 - i as f64 / 20.0)).collect();
        let ranked = fuse(&semantic, &[], &params());
        assert_eq!(ranked.ticket_ids(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn ties_break_by_ticket_id() {
        let ranked = fuse(&[hit(9, 0.5), hit(2, 0.5), hit(5, 0.5)], &[], &params());
        assert_eq!(ranked.ticket_ids(), vec![2, 5, 9]);
    }

    #[test]
    fn empty_inputs_give_empty_result() {
        assert!(fuse(&[], &[], &params()).is_empty());
    }

    #[test]
    fn validate_rejects_bad_weights_and_limits() {
        assert!(params().validate().is_ok());
        for bad in [
            FusionParams {
                semantic_weight: f64::NAN,
                ..params()
            },
            FusionParams {
                keyword_weight: -1.0,
                ..params()
            },
            FusionParams {
                result_limit: 0,
                ..params()
            },
            FusionParams {
                semantic_limit: usize::MAX,
                ..params()
            },
            FusionParams {
                lexical_limit: MAX_CANDIDATES + 1,
                ..params()
            },
        ] {
            assert!(bad.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    // -- HybridSearch with stub collaborators ------------------------------

    struct FixedEmbedder(Result<Vec<f32>, ()>);

    impl EmbeddingProvider for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed"
        }
        fn dimension(&self) -> usize {
            2
        }
        fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            self.0
                .clone()
                .map_err(|_| ProviderError::Unavailable("offline".into()))
        }
    }

    struct FixedSemantic(Vec<IndexHit>);

    impl SemanticIndex for FixedSemantic {
        fn dimension(&self) -> usize {
            2
        }
        fn nearest(&self, _q: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError> {
            Ok(self.0.iter().take(k).cloned().collect())
        }
    }

    /// Records the expression it was asked for.
    struct RecordingLexical {
        hits: Vec<IndexHit>,
        fail: bool,
        seen: Mutex<Vec<String>>,
    }

    impl LexicalIndex for RecordingLexical {
        fn lexical_rank(&self, expr: &str, _k: usize) -> Result<Vec<IndexHit>, IndexError> {
            self.seen.lock().unwrap().push(expr.to_string());
            if self.fail {
                return Err(IndexError::DimensionMismatch {
                    expected: 0,
                    actual: 0,
                });
            }
            if expr.is_empty() {
                return Ok(Vec::new());
            }
            Ok(self.hits.clone())
        }
    }

    fn engine(
        embed: Result<Vec<f32>, ()>,
        lexical_fail: bool,
    ) -> (HybridSearch, Arc<RecordingLexical>) {
        let lexical = Arc::new(RecordingLexical {
            hits: vec![hit(2, 0.02)],
            fail: lexical_fail,
            seen: Mutex::new(Vec::new()),
        });
        let search = HybridSearch::new(
            Arc::new(FixedEmbedder(embed)),
            Arc::new(FixedSemantic(vec![hit(1, 0.95)])),
            lexical.clone(),
            params(),
        );
        (search, lexical)
    }

    #[test]
    fn search_fuses_both_branches() {
        let (search, lexical) = engine(Ok(vec![1.0, 0.0]), false);
        let ranked = search.search("payment failed at checkout").unwrap();
        assert_eq!(ranked.ticket_ids(), vec![1, 2]);
        assert_eq!(
            lexical.seen.lock().unwrap().as_slice(),
            [r#""payment" OR "failed" OR "checkout""#]
        );
    }

    #[test]
    fn empty_query_is_purely_semantic() {
        let (search, lexical) = engine(Ok(vec![1.0, 0.0]), false);
        let ranked = search.search("").unwrap();
        assert_eq!(ranked.ticket_ids(), vec![1]);
        assert_eq!(lexical.seen.lock().unwrap().as_slice(), [""]);
    }

    #[test]
    fn embedding_failure_is_reported_first() {
        let (search, _) = engine(Err(()), true);
        let err = search.search("vpn").unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
    }

    #[test]
    fn lexical_failure_fails_the_query() {
        let (search, _) = engine(Ok(vec![1.0, 0.0]), true);
        let err = search.search("vpn").unwrap_err();
        assert_eq!(err.side(), RetrievalSide::Lexical);
    }

    #[test]
    fn retrieve_exposes_each_side() {
        let (search, _) = engine(Ok(vec![1.0, 0.0]), true);
        let sets = search.retrieve("vpn tunnel");
        assert_eq!(sets.keywords, vec!["vpn", "tunnel"]);
        assert!(sets.semantic.is_ok());
        assert_eq!(sets.failed_sides(), vec![RetrievalSide::Lexical]);
    }
}
