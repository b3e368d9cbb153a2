//! Domain types shared by the ingestor, the chunker, the vector store and the
//! retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;
pub type EmbeddingVector = Vec<f32>;

/// Metadata key holding the source path of a record or chunk.
pub const META_SOURCE: &str = "source";
/// Metadata key holding the position of a chunk within its parent record.
pub const META_CHUNK_INDEX: &str = "chunk_index";

/// Plain text extracted from one source file.
///
/// - `text`: the extracted text (first unit or all units, see `UnitSelection`)
/// - `source_path`: original path of the file
/// - `metadata`: lineage such as `source`, `page`, `row` or `sheet`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub text: String,
    pub source_path: String,
    pub metadata: Meta,
}

impl DocumentRecord {
    pub fn new(text: impl Into<String>, source_path: impl Into<String>) -> Self {
        let source_path = source_path.into();
        let mut metadata = Meta::new();
        metadata.insert(META_SOURCE.to_string(), source_path.clone());
        Self { text: text.into(), source_path, metadata }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A bounded window of a `DocumentRecord`, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_path: String,
    pub metadata: Meta,
}

impl Chunk {
    pub fn chunk_index(&self) -> Option<usize> {
        self.metadata.get(META_CHUNK_INDEX).and_then(|v| v.parse().ok())
    }
}

/// A chunk returned by a similarity search together with its score.
///
/// `score` is cosine similarity, higher is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub chunk: Chunk,
}

/// A file the ingestor could not turn into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}
