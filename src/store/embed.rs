// Pluggable embedding capability

use crate::store::StoreError;

/// Text-to-vector capability consumed by the vector store.
///
/// Real model or API backends implement this trait outside the core; the
/// core only assumes `embed` is synchronous and fallible.
pub trait Embedder: Send + Sync {
    /// Output vector dimensionality
    fn dimensions(&self) -> usize;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError>;

    /// Embed a batch (default: sequential)
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StoreError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Backend name for display
    fn name(&self) -> &'static str;
}

/// Deterministic feature-hashing embedder.
///
/// Tokens (and adjacent token pairs) are hashed into a fixed number of
/// buckets and the result is L2-normalized. No model weights, no I/O, fully
/// reproducible, which makes it the offline default and the test backend.
/// Swap in a real backend behind [`Embedder`] for semantic quality.
pub struct HashingEmbedder {
    dimensions: usize,
}

/// Default dimensionality for the hashing backend
pub const DEFAULT_DIMENSIONS: usize = 256;

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(&self, term: &str) -> usize {
        let digest = blake3::hash(term.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.as_bytes()[..8]);
        (u64::from_le_bytes(bytes) % self.dimensions as u64) as usize
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        let tokens = crate::store::lexical::tokenize(text);
        let mut vector = vec![0.0f32; self.dimensions];

        for token in &tokens {
            vector[self.bucket(token)] += 1.0;
        }
        // Adjacent pairs give the vector some phrase sensitivity
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            vector[self.bucket(&bigram)] += 0.5;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn name(&self) -> &'static str {
        "hashing"
    }
}
