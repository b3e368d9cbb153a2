use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use ragdb_core::config::EmbeddingSettings;
use ragdb_core::{Embedder, EmbeddingVector, Error, Result};

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    batch_size: usize,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            id: format!("openai:{model}"),
            model,
            batch_size: 256,
        }
    }

    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        let mut embedder = Self::new(settings.model.clone())
            .with_base_url(settings.base_url.clone())
            .with_batch_size(settings.batch_size);
        embedder.api_key.clone_from(&settings.api_key);
        embedder
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn request_batch(&self, api_key: &str, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        debug!(count = texts.len(), model = %self.model, "requesting embeddings");
        let body = serde_json::json!({
            "input": texts,
            "model": self.model,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::EmbeddingProviderUnavailable(format!("API error ({status}): {error_text}")));
        }

        let mut result: EmbeddingResponse = response.json().await.map_err(unavailable)?;
        if result.data.len() != texts.len() {
            return Err(Error::EmbeddingProviderUnavailable(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }
        result.data.sort_by_key(|item| item.index);
        if let Some((position, item)) = result.data.iter().enumerate().find(|(i, item)| item.index != *i) {
            return Err(Error::EmbeddingProviderUnavailable(format!(
                "response index {} at position {position}, expected indices 0..{}",
                item.index,
                texts.len()
            )));
        }
        Ok(result.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::EmbeddingProviderUnavailable("no API key configured".to_string()))?;

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.request_batch(api_key, batch).await?);
        }
        info!(count = vectors.len(), model = %self.model, "generated embeddings");
        Ok(vectors)
    }
}

fn unavailable(e: reqwest::Error) -> Error {
    Error::EmbeddingProviderUnavailable(e.to_string())
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
