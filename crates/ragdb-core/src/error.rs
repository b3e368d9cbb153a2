use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported format: {} (extension {extension:?})", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Failed to parse {}: {reason}", path.display())]
    ParseFailure { path: PathBuf, reason: String },

    #[error("Embedding provider unavailable: {0}")]
    EmbeddingProviderUnavailable(String),

    #[error("Index corruption: {0}")]
    IndexCorruption(String),

    #[error("Storage I/O failure at {}: {source}", path.display())]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Length mismatch: {chunks} chunks but {vectors} vectors")]
    LengthMismatch { chunks: usize, vectors: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedder mismatch: index built with '{expected}', got '{actual}'")]
    EmbedderMismatch { expected: String, actual: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("Language model failure: {0}")]
    LanguageModel(String),
}

impl Error {
    pub fn storage_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StorageIo { path: path.into(), source }
    }

    pub fn parse_failure(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ParseFailure { path: path.into(), reason: reason.to_string() }
    }

    /// Per-file ingestion errors are skipped by the batch; everything else aborts it.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::UnsupportedFormat { .. } | Self::ParseFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
