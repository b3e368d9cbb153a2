use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::EmbeddingVector;

/// Maps text to fixed-length vectors.
///
/// Implementations must be order preserving and return exactly one vector per
/// input text. Transport or provider failures are reported as
/// `Error::EmbeddingProviderUnavailable`; retrying is left to the caller.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-3-small`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;

    async fn embed_one(&self, text: &str) -> Result<EmbeddingVector> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            Error::EmbeddingProviderUnavailable("provider returned no vector for query".to_string())
        })
    }
}
