//! Embedding providers behind the `ragdb_core::Embedder` trait.

mod hashing;
mod openai;

use std::sync::Arc;
use tracing::info;

use ragdb_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use ragdb_core::Embedder;

pub use hashing::HashEmbedder;
pub use openai::OpenAiEmbedder;

/// Pick the embedder named by `settings.provider`.
pub fn build_embedder(settings: &EmbeddingSettings) -> Arc<dyn Embedder> {
    match settings.provider {
        EmbeddingProviderKind::Hash => {
            info!(dim = settings.dim, "using hashing embedder");
            Arc::new(HashEmbedder::new(settings.dim))
        }
        EmbeddingProviderKind::OpenAi => {
            info!(model = %settings.model, base_url = %settings.base_url, "using OpenAI-compatible embedder");
            Arc::new(OpenAiEmbedder::from_settings(settings))
        }
    }
}
