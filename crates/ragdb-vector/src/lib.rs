//! Persistent vector index store: an exact cosine `FlatIndex`, the document
//! store and the positional id map, saved atomically under a manifest.

pub mod flat;
pub mod persist;
pub mod store;

pub use flat::FlatIndex;
pub use persist::{read_manifest, Manifest, DOCSTORE_FILE, MANIFEST_FILE, VECTORS_FILE};
pub use store::{IdMap, ScoredChunk, VectorIndexStore};
