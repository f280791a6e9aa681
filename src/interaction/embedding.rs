use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{EngineError, EngineResult};

lazy_static! {
    static ref TOKEN_PATTERN: Regex = Regex::new(r"[a-z0-9]+").unwrap();
}

/// Converts text into a fixed-length vector.
///
/// Implementations must be deterministic and side-effect free: the same text
/// always encodes to the same vector. Retrieval and matching only ever see
/// this trait, so any semantic-vector backend can stand in.
pub trait Embedder: Send + Sync {
    fn encode(&self, text: &str) -> EngineResult<Vec<f32>>;

    fn dimension(&self) -> usize;
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding vector dimensions
    pub embedding_dimensions: usize,

    /// Maximum text length (bytes) considered for an embedding
    pub max_text_length: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            embedding_dimensions: 4096,
            max_text_length: 2048,
        }
    }
}

/// Text preprocessing for embeddings
#[derive(Debug, Clone)]
struct TextPreprocessor {
    max_text_length: usize,
    min_token_length: usize,
}

impl TextPreprocessor {
    fn new(max_text_length: usize) -> Self {
        Self {
            max_text_length,
            min_token_length: 3,
        }
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let truncated = truncate_at_char_boundary(&lowered, self.max_text_length);

        TOKEN_PATTERN
            .find_iter(truncated)
            .map(|m| m.as_str())
            .filter(|token| token.len() >= self.min_token_length)
            .map(str::to_string)
            .collect()
    }
}

fn truncate_at_char_boundary(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Bag-of-words embedder using the hashing trick.
///
/// Each token is hashed with SHA-256 into one of `embedding_dimensions`
/// buckets; the term-frequency vector is L2-normalized so a dot product is a
/// cosine similarity. Texts sharing drug names land close together, which is
/// all the retrieval step needs to propose candidates.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    config: EmbeddingConfig,
    preprocessor: TextPreprocessor,
}

impl HashingEmbedder {
    pub fn new(config: EmbeddingConfig) -> EngineResult<Self> {
        if config.embedding_dimensions == 0 {
            return Err(EngineError::Embedding(
                "embedding_dimensions must be greater than 0".to_string(),
            ));
        }

        let preprocessor = TextPreprocessor::new(config.max_text_length);
        Ok(Self { config, preprocessor })
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(prefix) % self.config.embedding_dimensions as u64) as usize
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        let config = EmbeddingConfig::default();
        let preprocessor = TextPreprocessor::new(config.max_text_length);
        Self { config, preprocessor }
    }
}

impl Embedder for HashingEmbedder {
    fn encode(&self, text: &str) -> EngineResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.config.embedding_dimensions];

        for token in self.preprocessor.tokenize(text) {
            vector[self.bucket(&token)] += 1.0;
        }

        // Normalize the vector
        let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dimensions
    }
}

/// Cosine similarity of two vectors; 0.0 when either is all zeros
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
