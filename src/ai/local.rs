//! Offline embedder based on feature hashing.
//!
//! Lets the project index work without any embedding endpoint. Vectors are
//! bag-of-words counts hashed into a fixed number of buckets and normalized,
//! which is crude but stable across restarts.

use async_trait::async_trait;

use super::{AIError, EmbeddingService};

/// Default number of hash buckets.
pub const DEFAULT_DIMENSIONS: usize = 256;

/// Feature-hashing embedder.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimensions: usize,
}

impl LocalEmbedder {
    /// Create an embedder with [`DEFAULT_DIMENSIONS`] buckets.
    pub fn new() -> Self {
        Self { dimensions: DEFAULT_DIMENSIONS }
    }

    /// Create an embedder with a custom bucket count.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    /// Embed a single text.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
        {
            let bucket = (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for LocalEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingService for LocalEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AIError> {
        Ok(inputs.iter().map(|text| self.embed_text(text)).collect())
    }

    fn name(&self) -> &str {
        "local"
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}
