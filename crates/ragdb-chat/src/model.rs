use async_trait::async_trait;
use futures::stream::BoxStream;

use ragdb_core::config::ChatSettings;
use ragdb_core::{Error, Result};

/// Lazily produced answer fragments, in order.
pub type TextStream = BoxStream<'static, Result<String>>;

/// A hosted language model that streams its completion of a prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_id(&self) -> &str;
    async fn stream(&self, prompt: String) -> Result<TextStream>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    Groq,
    OpenAi,
}

/// Endpoint and credentials resolved for `ChatSettings::base_model`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSelection {
    pub provider: ModelProvider,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
}

/// `llama*` models are served by Groq and `gpt*` models by OpenAI; anything
/// else is unsupported. The provider's key must be present.
pub fn select_model(settings: &ChatSettings) -> Result<ModelSelection> {
    let model = settings.base_model.trim();
    let (provider, base_url, key) = if model.starts_with("llama") {
        (ModelProvider::Groq, &settings.groq_base_url, settings.groq_api_key.as_ref())
    } else if model.starts_with("gpt") {
        (ModelProvider::OpenAi, &settings.openai_base_url, settings.openai_api_key.as_ref())
    } else {
        return Err(Error::UnsupportedModel(model.to_string()));
    };
    let api_key = key.filter(|k| !k.is_empty()).ok_or_else(|| {
        let name = match provider {
            ModelProvider::Groq => "Groq",
            ModelProvider::OpenAi => "OpenAI",
        };
        Error::InvalidConfig(format!("a {name} API key is required for model {model}"))
    })?;
    Ok(ModelSelection {
        provider,
        model: model.to_string(),
        base_url: base_url.trim_end_matches('/').to_string(),
        api_key: api_key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(model: &str) -> ChatSettings {
        ChatSettings {
            base_model: model.to_string(),
            groq_api_key: Some("gsk".to_string()),
            openai_api_key: Some("sk".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn llama_goes_to_groq_and_gpt_to_openai() {
        let llama = select_model(&settings("llama-3.1-8b-instant")).unwrap();
        assert_eq!(llama.provider, ModelProvider::Groq);
        assert_eq!(llama.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(llama.api_key, "gsk");

        let gpt = select_model(&settings("gpt-4o-mini")).unwrap();
        assert_eq!(gpt.provider, ModelProvider::OpenAi);
        assert_eq!(gpt.base_url, "https://api.openai.com/v1");
        assert_eq!(gpt.api_key, "sk");
    }

    #[test]
    fn unknown_family_is_unsupported() {
        let err = select_model(&settings("claude-3")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedModel(m) if m == "claude-3"));
    }

    #[test]
    fn missing_key_is_config_error() {
        let mut s = settings("llama-3.1-70b-versatile");
        s.groq_api_key = None;
        assert!(matches!(select_model(&s), Err(Error::InvalidConfig(_))));

        let mut s = settings("gpt-4o");
        s.openai_api_key = Some(String::new());
        assert!(matches!(select_model(&s), Err(Error::InvalidConfig(_))));
    }
}
