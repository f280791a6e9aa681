use std::sync::Arc;
use tracing::debug;

use super::embedding::{cosine_similarity, Embedder};
use super::rules::Rule;
use crate::errors::{EngineError, EngineResult};

/// A rule surfaced by retrieval together with its similarity score
#[derive(Debug, Clone)]
pub struct ScoredRule {
    pub rule: Arc<Rule>,
    pub score: f32,
}

/// Approximate lookup of the rules closest to a piece of text.
///
/// Results are ordered by score, highest first, and hold at most `k`
/// entries. A retriever proposes candidates only; it never decides whether
/// an interaction applies.
pub trait Retriever: Send + Sync {
    fn query(&self, text: &str, k: usize) -> EngineResult<Vec<ScoredRule>>;
}

/// Exhaustive cosine-similarity index over rule embeddings
pub struct RetrievalIndex {
    embedder: Arc<dyn Embedder>,
    entries: Vec<Arc<Rule>>,
}

impl RetrievalIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|rule| rule.id() == id)
    }

    /// Rules in insertion order
    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.entries
    }

    pub(crate) fn insert(&mut self, rule: Arc<Rule>) -> EngineResult<()> {
        if rule.embedding().len() != self.embedder.dimension() {
            return Err(EngineError::InternalAnalysis {
                context: format!("indexing rule '{}'", rule.id()),
                message: format!(
                    "embedding has {} dimensions, index expects {}",
                    rule.embedding().len(),
                    self.embedder.dimension()
                ),
            });
        }
        self.entries.push(rule);
        Ok(())
    }
}

impl Retriever for RetrievalIndex {
    fn query(&self, text: &str, k: usize) -> EngineResult<Vec<ScoredRule>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.encode(text)?;

        let mut results: Vec<ScoredRule> = self
            .entries
            .iter()
            .map(|rule| ScoredRule {
                rule: Arc::clone(rule),
                score: cosine_similarity(&query_vector, rule.embedding()),
            })
            .collect();

        // Stable sort: equal scores keep insertion order
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(k);

        debug!(
            "Retrieved {} candidate(s) for '{}' (best: {:?})",
            results.len(),
            text,
            results.first().map(|r| (r.rule.id().to_string(), r.score))
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::embedding::HashingEmbedder;
    use crate::interaction::rules::default_rules;

    fn build_index() -> RetrievalIndex {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
        let mut index = RetrievalIndex::new(Arc::clone(&embedder));
        for definition in default_rules() {
            let vector = embedder.encode(&definition.embedding_text()).unwrap();
            index.insert(Arc::new(Rule::new(definition, vector))).unwrap();
        }
        index
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = RetrievalIndex::new(Arc::new(HashingEmbedder::default()));
        assert!(index.query("Warfarin + Aspirin", 1).unwrap().is_empty());
    }

    #[test]
    fn test_results_bounded_by_k_and_sorted() {
        let index = build_index();

        let results = index.query("Warfarin + Aspirin", 3).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

        let all = index.query("Warfarin + Aspirin", 50).unwrap();
        assert_eq!(all.len(), 5);

        assert!(index.query("Warfarin + Aspirin", 0).unwrap().is_empty());
    }

    #[test]
    fn test_best_candidate_shares_drug_names() {
        let index = build_index();

        let best = index.query("Warfarin + Aspirin", 1).unwrap();
        assert_eq!(best[0].rule.id(), "rule_001");

        let best = index.query("Metformin + Alcohol", 1).unwrap();
        assert_eq!(best[0].rule.id(), "rule_003");

        let best = index.query("Grapefruit Juice + Atorvastatin", 1).unwrap();
        assert_eq!(best[0].rule.id(), "rule_005");
    }

    #[test]
    fn test_unrelated_query_still_returns_a_candidate() {
        let index = build_index();
        let results = index.query("Zolpidem + Melatonin", 1).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_query_does_not_mutate_index() {
        let index = build_index();
        index.query("Ibuprofen + Aspirin", 2).unwrap();
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut index = RetrievalIndex::new(Arc::new(HashingEmbedder::default()));
        let rule = Rule::new(default_rules().remove(0), vec![1.0; 3]);
        assert!(index.insert(Arc::new(rule)).is_err());
    }
}
