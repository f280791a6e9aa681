use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

use super::embedding::Embedder;
use super::index::RetrievalIndex;
use super::rules::{default_rules, Rule, RuleDefinition};
use crate::errors::{EngineError, EngineResult};

/// Lifecycle of the rule store. `Loaded` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Empty,
    Loaded,
}

/// What a call to [`RuleStore::load`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(usize),
    AlreadyLoaded(usize),
}

/// Canonical set of interaction rules and the index built over them.
///
/// The store is the only writer of rule data. Rules and their embeddings
/// live behind one lock so the index can never disagree with the rule set.
/// `loaded` only changes while that lock is held for writing; a load of an
/// empty batch still counts as loaded.
pub struct RuleStore {
    index: RwLock<RetrievalIndex>,
    loaded: AtomicBool,
    defaults: Vec<RuleDefinition>,
}

impl RuleStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self::with_defaults(embedder, default_rules())
    }

    /// Store whose lazy initialisation uses `defaults` instead of the
    /// built-in catalogue
    pub fn with_defaults(embedder: Arc<dyn Embedder>, defaults: Vec<RuleDefinition>) -> Self {
        Self {
            index: RwLock::new(RetrievalIndex::new(embedder)),
            loaded: AtomicBool::new(false),
            defaults,
        }
    }

    pub async fn state(&self) -> StoreState {
        if self.is_loaded() {
            StoreState::Loaded
        } else {
            StoreState::Empty
        }
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Load `rules` if the store is empty; otherwise do nothing.
    ///
    /// The emptiness check and the insert happen under one write lock, so
    /// concurrent first loads embed the rules exactly once. A batch with a
    /// malformed or duplicate rule is rejected whole.
    pub async fn load(&self, rules: Vec<RuleDefinition>) -> EngineResult<LoadOutcome> {
        let mut index = self.index.write().await;
        if self.is_loaded() {
            info!("Interaction rules already loaded ({} rules)", index.len());
            return Ok(LoadOutcome::AlreadyLoaded(index.len()));
        }

        let mut seen = HashSet::new();
        for definition in &rules {
            definition.validate()?;
            if !seen.insert(definition.id.as_str()) {
                return Err(EngineError::DuplicateRule {
                    id: definition.id.clone(),
                });
            }
        }

        let embedded = rules
            .into_iter()
            .map(|definition| embed_rule(index.embedder().as_ref(), definition))
            .collect::<EngineResult<Vec<_>>>()?;

        let count = embedded.len();
        for rule in embedded {
            index.insert(Arc::new(rule))?;
        }
        self.loaded.store(true, Ordering::Release);

        info!("Loaded {} interaction rules", count);
        Ok(LoadOutcome::Loaded(count))
    }

    /// Load the default rules on first use
    pub async fn ensure_loaded(&self) -> EngineResult<()> {
        if self.is_loaded() {
            return Ok(());
        }
        debug!("Rule store empty, loading default catalogue");
        self.load(self.defaults.clone()).await?;
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.index.read().await.len()
    }

    /// All rules in insertion order, loading the defaults if empty
    pub async fn get_all(&self) -> EngineResult<Vec<Rule>> {
        self.ensure_loaded().await?;
        let index = self.index.read().await;
        Ok(index.rules().iter().map(|rule| rule.as_ref().clone()).collect())
    }

    /// Administrative addition of a single rule
    pub async fn add_rule(&self, definition: RuleDefinition) -> EngineResult<()> {
        definition.validate()?;
        self.ensure_loaded().await?;

        let mut index = self.index.write().await;
        if index.contains(&definition.id) {
            return Err(EngineError::DuplicateRule { id: definition.id });
        }

        let rule = embed_rule(index.embedder().as_ref(), definition)?;
        info!("Added interaction rule '{}' ({})", rule.id(), rule.interaction());
        index.insert(Arc::new(rule))
    }

    /// Read access to the loaded index, loading the defaults if empty
    pub async fn index(&self) -> EngineResult<RwLockReadGuard<'_, RetrievalIndex>> {
        self.ensure_loaded().await?;
        Ok(self.index.read().await)
    }
}

fn embed_rule(embedder: &dyn Embedder, definition: RuleDefinition) -> EngineResult<Rule> {
    let vector = embedder.encode(&definition.embedding_text())?;
    Ok(Rule::new(definition, vector))
}
