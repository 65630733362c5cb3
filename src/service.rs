//! Boundary around the retrieval core.
//!
//! [`HybridSearch`] never degrades silently: if either side fails the
//! query fails. [`TicketSearchService`] is where a caller opts into a
//! policy. Under [`DegradePolicy::BestEffort`] a query with exactly one
//! failed side is fused from the surviving side alone.

use crate::config::schema::DegradePolicy;
use crate::error::RetrievalError;
use crate::search::format::format_results;
use crate::search::fusion::{fuse, HybridSearch};
use crate::types::RankedResult;

/// Prefix of the report returned when a search fails.
pub const SEARCH_ERROR_PREFIX: &str = "Error searching tickets: ";

#[derive(Debug, Clone)]
pub struct TicketSearchService {
    engine: HybridSearch,
    policy: DegradePolicy,
}

impl TicketSearchService {
    pub fn new(engine: HybridSearch, policy: DegradePolicy) -> Self {
        Self { engine, policy }
    }

    pub fn engine(&self) -> &HybridSearch {
        &self.engine
    }

    pub fn policy(&self) -> DegradePolicy {
        self.policy
    }

    /// Ranked candidates for `query` under the configured policy.
    pub fn search(&self, query: &str) -> Result<RankedResult, RetrievalError> {
        let sets = self.engine.retrieve(query);
        let params = *self.engine.params();

        match (self.policy, sets.semantic, sets.lexical) {
            (_, Ok(semantic), Ok(lexical)) => Ok(fuse(&semantic, &lexical, &params)),
            (DegradePolicy::BestEffort, Ok(semantic), Err(e)) => {
                tracing::warn!(side = %e.side(), error = %e, "degrading to semantic-only ranking");
                Ok(fuse(&semantic, &[], &params))
            }
            (DegradePolicy::BestEffort, Err(e), Ok(lexical)) => {
                tracing::warn!(side = %e.side(), error = %e, "degrading to lexical-only ranking");
                Ok(fuse(&[], &lexical, &params))
            }
            // Both failed, or the policy is Fail: first failure wins.
            (_, Err(e), _) | (_, Ok(_), Err(e)) => {
                tracing::error!(side = %e.side(), error = %e, "search failed");
                Err(e)
            }
        }
    }

    /// Rendered report, or the diagnostic text when the search fails.
    pub fn report(&self, query: &str) -> String {
        match self.search(query) {
            Ok(ranked) => format_results(&ranked),
            Err(e) => format!("{SEARCH_ERROR_PREFIX}{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::embedding::EmbeddingProvider;
    use crate::error::{IndexError, ProviderError};
    use crate::search::fusion::FusionParams;
    use crate::search::lexical::LexicalIndex;
    use crate::search::semantic::SemanticIndex;
    use crate::search::NO_RESULTS;
    use crate::types::IndexHit;

    struct Embedder {
        fail: bool,
    }

    impl EmbeddingProvider for Embedder {
        fn name(&self) -> &str {
            "stub"
        }
        fn dimension(&self) -> usize {
            2
        }
        fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            if self.fail {
                Err(ProviderError::Api {
                    status: 503,
                    message: "upstream unavailable".into(),
                })
            } else {
                Ok(vec![1.0, 0.0])
            }
        }
    }

    struct Semantic(Vec<IndexHit>);

    impl SemanticIndex for Semantic {
        fn dimension(&self) -> usize {
            2
        }
        fn nearest(&self, _q: &[f32], _k: usize) -> Result<Vec<IndexHit>, IndexError> {
            Ok(self.0.clone())
        }
    }

    struct Lexical {
        hits: Vec<IndexHit>,
        fail: bool,
    }

    impl LexicalIndex for Lexical {
        fn lexical_rank(&self, _e: &str, _k: usize) -> Result<Vec<IndexHit>, IndexError> {
            if self.fail {
                Err(IndexError::Sqlite(rusqlite::Error::InvalidQuery))
            } else {
                Ok(self.hits.clone())
            }
        }
    }

    fn hit(id: i64, score: f64) -> IndexHit {
        IndexHit {
            ticket_id: id,
            subject: format!("Subject {id}"),
            summary: format!("Summary {id}"),
            score,
        }
    }

    fn service(embed_fail: bool, lexical_fail: bool, policy: DegradePolicy) -> TicketSearchService {
        let engine = HybridSearch::new(
            Arc::new(Embedder { fail: embed_fail }),
            Arc::new(Semantic(vec![hit(1, 0.9)])),
            Arc::new(Lexical {
                hits: vec![hit(2, 0.03)],
                fail: lexical_fail,
            }),
            FusionParams::default(),
        );
        TicketSearchService::new(engine, policy)
    }

    #[test]
    fn healthy_query_fuses_both_sides() {
        let ranked = service(false, false, DegradePolicy::Fail)
            .search("payment failed")
            .unwrap();
        assert_eq!(ranked.ticket_ids(), vec![2, 1]);
    }

    #[test]
    fn fail_policy_propagates_first_error() {
        let svc = service(true, true, DegradePolicy::Fail);
        let err = svc.search("payment").unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
    }

    #[test]
    fn best_effort_keeps_semantic_side() {
        let svc = service(false, true, DegradePolicy::BestEffort);
        assert_eq!(svc.search("payment").unwrap().ticket_ids(), vec![1]);
    }

    #[test]
    fn best_effort_keeps_lexical_side() {
        let svc = service(true, false, DegradePolicy::BestEffort);
        assert_eq!(svc.search("payment").unwrap().ticket_ids(), vec![2]);
    }

    #[test]
    fn best_effort_still_fails_when_both_sides_fail() {
        let svc = service(true, true, DegradePolicy::BestEffort);
        assert!(svc.search("payment").is_err());
    }

    #[test]
    fn report_renders_diagnostic_on_failure() {
        let report = service(true, false, DegradePolicy::Fail).report("payment");
        assert!(report.starts_with(SEARCH_ERROR_PREFIX), "{report}");
        assert!(report.contains("503"));
    }

    #[test]
    fn report_renders_sentinel_for_empty_result() {
        let engine = HybridSearch::new(
            Arc::new(Embedder { fail: false }),
            Arc::new(Semantic(Vec::new())),
            Arc::new(Lexical {
                hits: Vec::new(),
                fail: false,
            }),
            FusionParams::default(),
        );
        let svc = TicketSearchService::new(engine, DegradePolicy::Fail);
        assert_eq!(svc.report("anything"), NO_RESULTS);
    }
}
