use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

use ragdb_core::{Chunk, ChunkId, EmbeddingVector, Error, Result, SearchHit};

use crate::flat::FlatIndex;
use crate::persist;

pub type ScoredChunk = SearchHit;

/// Position in the flat index -> chunk id. The only mapping between the two.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdMap(Vec<ChunkId>);

impl IdMap {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&ChunkId> {
        self.0.get(position)
    }

    pub fn push(&mut self, id: ChunkId) {
        self.0.push(id);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunkId> {
        self.0.iter()
    }
}

/// Flat vector index, document store and id map kept in lockstep.
///
/// After every completed `create`/`merge` the three hold the same number of
/// entries. Ids are consecutive integers starting at the document-store size
/// at the time of insertion and are never reused.
#[derive(Debug, Clone, Default)]
pub struct VectorIndexStore {
    pub(crate) index: FlatIndex,
    pub(crate) docstore: BTreeMap<ChunkId, Chunk>,
    pub(crate) id_map: IdMap,
    pub(crate) embedder_id: Option<String>,
}

impl VectorIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from parallel `chunks`/`vectors`, ids `0..n`.
    pub fn create(chunks: Vec<Chunk>, vectors: Vec<EmbeddingVector>, embedder_id: &str) -> Result<Self> {
        let mut store = Self::new();
        store.merge(chunks, vectors, embedder_id)?;
        store.embedder_id = Some(embedder_id.to_string());
        Ok(store)
    }

    /// Append new entries and return their ids in input order.
    ///
    /// Nothing is modified when a precondition fails. A broken invariant after
    /// the append is reported as `IndexCorruption`; such a store must not be
    /// saved.
    pub fn merge(&mut self, chunks: Vec<Chunk>, vectors: Vec<EmbeddingVector>, embedder_id: &str) -> Result<Vec<ChunkId>> {
        if chunks.len() != vectors.len() {
            return Err(Error::LengthMismatch { chunks: chunks.len(), vectors: vectors.len() });
        }
        if let Some(existing) = self.embedder_id.as_deref() {
            if !self.is_empty() && existing != embedder_id {
                return Err(Error::EmbedderMismatch { expected: existing.to_string(), actual: embedder_id.to_string() });
            }
        }
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let incoming = FlatIndex::from_vectors(&vectors)?;
        if !self.index.is_empty() && incoming.dim() != self.index.dim() {
            return Err(Error::DimensionMismatch { expected: self.index.dim(), actual: incoming.dim() });
        }

        let start = self.docstore.len();
        let ids: Vec<ChunkId> = (start..start + chunks.len()).map(|i| i.to_string()).collect();
        if let Some(taken) = ids.iter().find(|id| self.docstore.contains_key(*id)) {
            return Err(Error::IndexCorruption(format!("chunk id {taken} is already in the document store")));
        }

        self.index.append(incoming)?;
        for (id, chunk) in ids.iter().zip(chunks) {
            self.docstore.insert(id.clone(), chunk);
            self.id_map.push(id.clone());
        }
        self.embedder_id = Some(embedder_id.to_string());
        self.check_invariant()?;
        debug!(added = ids.len(), total = self.len(), "merged entries");
        Ok(ids)
    }

    /// Top `k` chunks by cosine similarity to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let hits = self.index.search(query, k)?;
        hits.into_iter()
            .map(|(position, score)| {
                let id = self
                    .id_map
                    .get(position)
                    .ok_or_else(|| Error::IndexCorruption(format!("no id for position {position}")))?;
                let chunk = self
                    .docstore
                    .get(id)
                    .ok_or_else(|| Error::IndexCorruption(format!("id {id} missing from document store")))?;
                Ok(SearchHit { id: id.clone(), score, chunk: chunk.clone() })
            })
            .collect()
    }

    /// Verify that the index, the document store and the id map agree.
    pub fn check_invariant(&self) -> Result<()> {
        let (docs, vectors, ids) = (self.docstore.len(), self.index.len(), self.id_map.len());
        if docs != vectors || vectors != ids {
            return Err(Error::IndexCorruption(format!(
                "count mismatch: {docs} documents, {vectors} vectors, {ids} id map entries"
            )));
        }
        let mut seen = HashSet::with_capacity(ids);
        for id in self.id_map.iter() {
            if !seen.insert(id) {
                return Err(Error::IndexCorruption(format!("id {id} mapped twice")));
            }
            if !self.docstore.contains_key(id) {
                return Err(Error::IndexCorruption(format!("id {id} missing from document store")));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.docstore.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docstore.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.index.dim()
    }

    pub fn embedder_id(&self) -> Option<&str> {
        self.embedder_id.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.docstore.get(id)
    }

    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }

    /// Whether a committed store exists at `path`.
    pub fn exists(path: &Path) -> bool {
        persist::manifest_path(path).is_file()
    }

    /// Strict load: any missing, tampered or inconsistent file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let store = persist::read_store(path)?;
        info!(path = %path.display(), entries = store.len(), dim = store.dim(), "loaded vector store");
        Ok(store)
    }

    /// Load the store at `path`, or start empty. The load failure, if any, is
    /// returned alongside the empty store.
    pub fn load_or_create(path: &Path) -> (Self, Option<Error>) {
        match Self::load(path) {
            Ok(store) => (store, None),
            Err(e) => {
                if Self::exists(path) {
                    warn!(path = %path.display(), error = %e, "discarding unreadable vector store");
                } else {
                    info!(path = %path.display(), "no vector store yet, starting empty");
                }
                (Self::new(), Some(e))
            }
        }
    }

    /// Write the store under `path`; the manifest is written last.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.check_invariant()?;
        persist::write_store(self, path)?;
        info!(path = %path.display(), entries = self.len(), "saved vector store");
        Ok(())
    }
}
