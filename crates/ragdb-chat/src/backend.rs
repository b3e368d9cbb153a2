use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use ragdb_core::config::ChatSettings;
use ragdb_core::Result;
use ragdb_pipeline::RetrievalPipeline;

use crate::model::{select_model, ChatModel, TextStream};
use crate::openai::OpenAiChatModel;
use crate::prompt::render_prompt;
use crate::session::ChatSession;

/// Answers one chat turn: retrieves context from the index (when one exists),
/// fills the prompt and streams the model's reply.
pub struct ChatBackend {
    pipeline: RetrievalPipeline,
    model: Arc<dyn ChatModel>,
    top_k: usize,
}

impl ChatBackend {
    pub fn new(pipeline: RetrievalPipeline, model: Arc<dyn ChatModel>, top_k: usize) -> Self {
        Self { pipeline, model, top_k }
    }

    /// Resolve the model from `settings` and build an OpenAI-compatible client for it.
    pub fn from_settings(pipeline: RetrievalPipeline, settings: &ChatSettings) -> Result<Self> {
        let selection = select_model(settings)?;
        info!(model = %selection.model, provider = ?selection.provider, "chat model selected");
        let model = Arc::new(OpenAiChatModel::new(selection, settings));
        Ok(Self::new(pipeline, model, settings.top_k))
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Build the prompt for `query` without calling the model.
    pub async fn build_prompt(&self, query: &str, session: &ChatSession) -> Result<String> {
        let context = self.pipeline.answer_context(query, self.top_k).await?;
        if context.is_empty() {
            debug!("no retrieval context, querying the model directly");
        }
        Ok(render_prompt(&context, &session.render_history(), query))
    }

    /// Stream the answer to `query`. Each call starts a fresh request.
    pub async fn get_response(&self, query: &str, session: &ChatSession) -> Result<TextStream> {
        let prompt = self.build_prompt(query, session).await?;
        self.model.stream(prompt).await
    }

    /// Run one full turn: stream the answer through `on_fragment` and append
    /// the exchange to `session` once the stream completes. An interrupted
    /// stream returns the error and leaves the history untouched.
    pub async fn converse(
        &self,
        query: &str,
        session: &mut ChatSession,
        mut on_fragment: impl FnMut(&str),
    ) -> Result<String> {
        let mut stream = self.get_response(query, session).await?;
        let mut answer = String::new();
        while let Some(fragment) = stream.next().await {
            let text = fragment.map_err(|e| {
                warn!(error = %e, received = answer.len(), "answer stream interrupted");
                e
            })?;
            on_fragment(&text);
            answer.push_str(&text);
        }
        session.push_user(query);
        session.push_assistant(answer.clone());
        Ok(answer)
    }
}
