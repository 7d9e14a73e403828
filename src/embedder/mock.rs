/// Mock embedder for tests and offline runs.
///
/// Hashes lowercase word tokens into a fixed number of buckets (feature
/// hashing), so texts sharing vocabulary land close together and identical
/// texts always produce identical vectors.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Embedder, EmbedderError, l2_normalize};

/// Model name reported by [`MockEmbedder`] unless overridden.
pub const MOCK_MODEL: &str = "mock-hash";

/// A deterministic bag-of-words embedder.
pub struct MockEmbedder {
    pub dimensions: usize,
    model: String,
}

impl MockEmbedder {
    /// Create a new `MockEmbedder` with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            model: MOCK_MODEL.to_string(),
        }
    }

    /// Report `model` as the model name. Vectors are unchanged.
    #[must_use]
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

fn bucket(token: &str, dimensions: usize) -> (usize, f32) {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    let hash = hasher.finish();
    let index = (hash % dimensions as u64) as usize;
    let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
    (index, sign)
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (index, sign) = bucket(token, self.dimensions);
            embedding[index] += sign;
        }

        // Empty input or cancelling tokens: cosine is undefined at zero
        if embedding.iter().all(|v| *v == 0.0) {
            embedding[0] = 1.0;
        }

        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}
