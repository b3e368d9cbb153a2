//! Core domain for ragdb: document records and chunks, the error taxonomy,
//! the `Embedder` seam, configuration, the directory ingestor and the
//! recursive chunker.

pub mod chunker;
pub mod config;
pub mod error;
pub mod ingest;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, ChunkingConfig};
pub use error::{Error, Result};
pub use ingest::{IngestOutcome, Ingestor, UnitSelection};
pub use traits::Embedder;
pub use types::{Chunk, ChunkId, DocumentRecord, EmbeddingVector, Meta, SearchHit, SkippedFile};
