use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};
use crate::ingest::UnitSelection;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    /// Build a config from an inline TOML document layered over the defaults.
    pub fn from_toml_str(toml: &str) -> Self {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml));
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Typed view of the whole configuration with API keys filled from the
    /// conventional environment variables when not set explicitly.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.fill_secrets_from_env();
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingConfig,
    pub ingest: IngestSettings,
    pub embedding: EmbeddingSettings,
    pub chat: ChatSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be > 0".to_string()));
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(Error::InvalidConfig(format!(
                "chat.temperature must be within 0.0..=2.0, got {}",
                self.chat.temperature
            )));
        }
        Ok(())
    }

    fn fill_secrets_from_env(&mut self) {
        let openai = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        let groq = env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty());
        if self.embedding.api_key.is_none() {
            self.embedding.api_key.clone_from(&openai);
        }
        if self.chat.openai_api_key.is_none() {
            self.chat.openai_api_key = openai;
        }
        if self.chat.groq_api_key.is_none() {
            self.chat.groq_api_key = groq;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub documents_dir: String,
    pub index_dir: String,
    pub glob_pattern: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            documents_dir: "documentos".to_string(),
            index_dir: "documentos/faiss_index_chatbot".to_string(),
            glob_pattern: "**/*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub units: UnitSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    OpenAi,
    /// Deterministic token hashing, no network access.
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Output dimension of the hashing provider.
    pub dim: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::OpenAi,
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            dim: 384,
            batch_size: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub base_model: String,
    pub temperature: f32,
    pub top_k: usize,
    pub max_tokens: Option<u32>,
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_base_url: String,
    pub groq_base_url: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            base_model: "llama-3.1-70b-versatile".to_string(),
            temperature: 0.6,
            top_k: 3,
            max_tokens: None,
            openai_api_key: None,
            groq_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            groq_base_url: "https://api.groq.com/openai/v1".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_loader() {
        let settings = Config::from_toml_str("").settings().unwrap();
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.chunk_overlap, 200);
        assert_eq!(settings.chunking.separators, vec!["\n".to_string()]);
        assert_eq!(settings.ingest.units, UnitSelection::First);
        assert_eq!(settings.chat.top_k, 3);
        assert_eq!(settings.embedding.model, "text-embedding-3-small");
    }

    #[test]
    fn toml_overrides_layer_over_defaults() {
        let config = Config::from_toml_str(
            r#"
            [chunking]
            chunk_size = 500

            [ingest]
            units = "all"

            [embedding]
            provider = "hash"
            dim = 64
            "#,
        );
        let settings = config.settings().unwrap();
        assert_eq!(settings.chunking.chunk_size, 500);
        assert_eq!(settings.chunking.chunk_overlap, 200);
        assert_eq!(settings.ingest.units, UnitSelection::All);
        assert_eq!(settings.embedding.provider, EmbeddingProviderKind::Hash);
        assert_eq!(settings.embedding.dim, 64);
        let size: usize = config.get("chunking.chunk_size").unwrap();
        assert_eq!(size, 500);
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        let settings = Config::from_toml_str("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n")
            .settings()
            .unwrap();
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn resolve_keeps_absolute_and_joins_relative() {
        let base = Path::new("/srv/data");
        assert_eq!(resolve_with_base(base, "/tmp/x"), PathBuf::from("/tmp/x"));
        assert_eq!(resolve_with_base(base, "docs"), PathBuf::from("/srv/data/docs"));
    }
}
