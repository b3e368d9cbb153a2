use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use ragdb_core::{Embedder, EmbeddingVector, Result};

/// Token-hashing embedder: every whitespace token lands in one bucket chosen
/// by its xxhash. Needs no network and gives identical vectors for identical
/// text, so shared tokens produce positive cosine similarity.
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("hash:{dim}") }
    }

    pub fn embed_text(&self, text: &str) -> EmbeddingVector {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += 1.0 + val + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn vectors_are_normalized_and_deterministic() {
        let e = HashEmbedder::new(64);
        let v1 = e.embed_text("hello world");
        let v2 = e.embed_text("hello world");
        assert_eq!(v1.len(), 64);
        assert_eq!(v1, v2);
        let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() <= 1e-3, "norm={norm}");
    }

    #[test]
    fn shared_tokens_score_higher_than_disjoint_text() {
        let e = HashEmbedder::new(256);
        let q = e.embed_text("solar panel maintenance");
        let near = e.embed_text("maintenance of the solar panel array");
        let far = e.embed_text("sourdough starter feeding schedule");
        assert!(cosine(&q, &near) > cosine(&q, &far));
    }

    #[test]
    fn empty_text_is_a_zero_vector() {
        let v = HashEmbedder::new(8).embed_text("   ");
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
