//! Deterministic offline embedder based on feature hashing.
//!
//! Tokens and adjacent-token bigrams are hashed (SHA-256) into buckets of
//! a fixed-size vector, which is then L2-normalised. Texts sharing words
//! land close together under cosine distance. Useful for tests, demos and
//! air-gapped deployments; not a substitute for a trained model.

use sha2::{Digest, Sha256};

use crate::embedding::EmbeddingProvider;
use crate::error::ProviderError;

const TOKEN_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.5;
// Every text gets this feature, so no vector is ever all zeros.
const BIAS_FEATURE: &str = "\u{0}bias";
const BIAS_WEIGHT: f32 = 0.05;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, feature: &str) -> usize {
        let digest = Sha256::digest(feature.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(head) % self.dimension as u64) as usize
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector {
            *value /= norm;
        }
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0f32; self.dimension];
        vector[self.bucket(BIAS_FEATURE)] += BIAS_WEIGHT;

        let tokens = tokenize(text);
        for token in &tokens {
            vector[self.bucket(token)] += TOKEN_WEIGHT;
        }
        for pair in tokens.windows(2) {
            vector[self.bucket(&format!("{} {}", pair[0], pair[1]))] += BIGRAM_WEIGHT;
        }

        normalize(&mut vector);
        Ok(vector)
    }
}
