use std::sync::Arc;
use tracing::{debug, info};

use super::embedding::{Embedder, EmbeddingConfig, HashingEmbedder};
use super::resolver::{analysis_failure, AnalysisResult, ResultResolver};
use super::rules::{default_rules, Rule, RuleDefinition};
use super::store::{LoadOutcome, RuleStore};
use super::validator::{SubstringValidator, Validator};
use crate::errors::{EngineError, EngineResult};

/// Entry point to interaction checking.
///
/// Cheap to share behind an `Arc`: after the first load every operation
/// except rule addition only takes read locks.
pub struct InteractionEngine<V = SubstringValidator> {
    store: RuleStore,
    resolver: ResultResolver<V>,
}

impl InteractionEngine<SubstringValidator> {
    pub fn new(config: EmbeddingConfig) -> EngineResult<Self> {
        let embedder = Arc::new(HashingEmbedder::new(config)?);
        Ok(Self::with_components(
            RuleStore::new(embedder),
            SubstringValidator,
        ))
    }
}

impl Default for InteractionEngine<SubstringValidator> {
    fn default() -> Self {
        Self::with_components(
            RuleStore::new(Arc::new(HashingEmbedder::default())),
            SubstringValidator,
        )
    }
}

impl<V: Validator> InteractionEngine<V> {
    pub fn with_components(store: RuleStore, validator: V) -> Self {
        Self {
            store,
            resolver: ResultResolver::new(validator),
        }
    }

    /// Engine over any embedding backend and validator
    pub fn with_embedder(embedder: Arc<dyn Embedder>, validator: V) -> Self {
        Self::with_components(RuleStore::new(embedder), validator)
    }

    /// Load `rules`, or the built-in catalogue when `None`. A no-op once any
    /// rule is loaded.
    pub async fn load_rules(&self, rules: Option<Vec<RuleDefinition>>) -> EngineResult<LoadOutcome> {
        self.store.load(rules.unwrap_or_else(default_rules)).await
    }

    /// Check `new_medicine` against the current medication `history`
    pub async fn analyze(&self, history: &[String], new_medicine: &str) -> EngineResult<AnalysisResult> {
        if new_medicine.trim().is_empty() {
            return Err(EngineError::EmptyInput { field: "new_medicine" });
        }

        let index = self
            .store
            .index()
            .await
            .map_err(|e| analysis_failure("loading interaction rules".to_string(), e))?;
        let result = self.resolver.resolve(&*index, history, new_medicine)?;

        info!(
            "Analyzed {} against {} medication(s): {} ({} interaction(s))",
            new_medicine,
            history.len(),
            result.status(),
            result.interactions().len()
        );
        Ok(result)
    }

    /// All rules in store order, loading the catalogue if necessary
    pub async fn get_all_rules(&self) -> EngineResult<Vec<Rule>> {
        self.store.get_all().await
    }

    pub async fn add_rule(&self, definition: RuleDefinition) -> EngineResult<()> {
        debug!("Adding rule '{}'", definition.id);
        self.store.add_rule(definition).await
    }

    pub async fn rule_count(&self) -> usize {
        self.store.count().await
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }
}
