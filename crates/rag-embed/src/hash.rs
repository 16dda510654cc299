//! Feature-hashing embedder.

use async_trait::async_trait;

use rag_core::{Embedder, RagError, Result};

/// Default embedding dimension.
const DEFAULT_DIMENSION: usize = 384;

/// Deterministic bag-of-words embedder.
///
/// Every lowercase term (and every adjacent term pair) is hashed with
/// blake3 into a signed bucket; the vector is L2-normalised. Texts sharing
/// vocabulary land close together, which is enough for offline use and
/// tests without a model download.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create a new hash embedder with default settings.
    pub fn new() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
        }
    }

    /// Create a hash embedder with a custom dimension.
    pub fn with_dimension(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::embedding("dimension must be positive"));
        }
        Ok(Self { dimension })
    }

    fn add_feature(&self, embedding: &mut [f32], feature: &str, weight: f32) {
        let hash = blake3::hash(feature.as_bytes());
        let bytes = hash.as_bytes();
        let bucket = u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]) as usize
            % self.dimension;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        embedding[bucket] += sign * weight;
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let terms: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();

        let mut embedding = vec![0.0f32; self.dimension];
        for term in &terms {
            self.add_feature(&mut embedding, term, 1.0);
        }
        for pair in terms.windows(2) {
            self.add_feature(&mut embedding, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        // L2 normalize
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
