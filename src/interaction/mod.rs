pub mod embedding;
pub mod engine;
pub mod index;
pub mod resolver;
pub mod rules;
pub mod store;
pub mod validator;

// Re-export key types for convenience
pub use embedding::{Embedder, EmbeddingConfig, HashingEmbedder};
pub use engine::InteractionEngine;
pub use index::{RetrievalIndex, Retriever, ScoredRule};
pub use resolver::{
    AnalysisResult, InteractionMatch, ResultResolver, RISKY_CONFIDENCE, SAFE_CONFIDENCE,
};
pub use rules::{default_rules, RiskLevel, Rule, RuleDefinition};
pub use store::{LoadOutcome, RuleStore, StoreState};
pub use validator::{SubstringValidator, Validator};
