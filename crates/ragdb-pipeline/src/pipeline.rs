use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use ragdb_core::config::{resolve_with_base, Settings};
use ragdb_core::{Chunker, ChunkingConfig, Embedder, EmbeddingVector, Error, Ingestor, Result, SearchHit, SkippedFile, UnitSelection};
use ragdb_vector::VectorIndexStore;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub index_path: PathBuf,
    pub chunking: ChunkingConfig,
    pub units: UnitSelection,
    pub batch_size: usize,
    pub show_progress: bool,
}

impl PipelineOptions {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            chunking: ChunkingConfig::default(),
            units: UnitSelection::default(),
            batch_size: 256,
            show_progress: false,
        }
    }

    /// Options from loaded settings; a relative index dir is resolved against `base`.
    pub fn from_settings(settings: &Settings, base: &Path) -> Self {
        Self {
            index_path: resolve_with_base(base, &settings.data.index_dir),
            chunking: settings.chunking.clone(),
            units: settings.ingest.units,
            batch_size: settings.embedding.batch_size,
            show_progress: false,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_ingested: usize,
    pub chunks_added: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Ingest → chunk → embed → merge → save, and query the saved index.
///
/// Every call loads the store from disk and saves it wholesale. Concurrent
/// `ingest` calls on the same index are not coordinated; the last save wins.
pub struct RetrievalPipeline {
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    options: PipelineOptions,
}

impl RetrievalPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, options: PipelineOptions) -> Result<Self> {
        let chunker = Chunker::new(options.chunking.clone())?;
        Ok(Self { embedder, chunker, options })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn has_index(&self) -> bool {
        VectorIndexStore::exists(&self.options.index_path)
    }

    pub async fn ingest(&self, directory: &Path, pattern: &str) -> Result<IngestReport> {
        let index_path = &self.options.index_path;
        let (mut store, load_error) = VectorIndexStore::load_or_create(index_path);
        if let Some(e) = load_error {
            if VectorIndexStore::exists(index_path) {
                warn!(path = %index_path.display(), error = %e, "existing index is unreadable, rebuilding from this batch");
            }
        }

        let outcome = Ingestor::new(self.options.units)
            .exclude(index_path)
            .load_directory(directory, pattern)?;
        let chunks = self.chunker.split_documents(&outcome.records);
        let mut report = IngestReport {
            files_ingested: outcome.records.len(),
            chunks_added: 0,
            skipped: outcome.skipped,
        };
        if chunks.is_empty() {
            info!(dir = %directory.display(), "no chunks produced, index left unchanged");
            return Ok(report);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_all(&texts).await?;
        let embedder_id = self.embedder.embedder_id();

        let added = chunks.len();
        if store.is_empty() {
            store = VectorIndexStore::create(chunks, vectors, embedder_id)?;
        } else {
            store.merge(chunks, vectors, embedder_id)?;
        }
        store.save(index_path)?;

        report.chunks_added = added;
        info!(
            files = report.files_ingested,
            chunks = added,
            skipped = report.skipped.len(),
            total = store.len(),
            "ingest complete"
        );
        Ok(report)
    }

    /// Top `k` chunks for `query`. No saved index yields no hits.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || !self.has_index() {
            return Ok(Vec::new());
        }
        let store = VectorIndexStore::load(&self.options.index_path)?;
        if store.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(built_with) = store.embedder_id() {
            if built_with != self.embedder.embedder_id() {
                return Err(Error::EmbedderMismatch {
                    expected: built_with.to_string(),
                    actual: self.embedder.embedder_id().to_string(),
                });
            }
        }
        let query_vector = self.embedder.embed_one(query).await?;
        let hits = store.search(&query_vector, k)?;
        debug!(k, hits = hits.len(), "search");
        Ok(hits)
    }

    /// Retrieved chunk texts joined by a blank line, or `""` when there is no
    /// usable index.
    pub async fn answer_context(&self, query: &str, k: usize) -> Result<String> {
        match self.search(query, k).await {
            Ok(hits) => Ok(hits.into_iter().map(|h| h.chunk.text).collect::<Vec<_>>().join("\n\n")),
            Err(
                e @ (Error::IndexCorruption(_)
                | Error::StorageIo { .. }
                | Error::EmbedderMismatch { .. }
                | Error::DimensionMismatch { .. }),
            ) => {
                warn!(error = %e, "index unusable, answering without context");
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let pb = if self.options.show_progress {
            let pb = ProgressBar::new(texts.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.options.batch_size.max(1)) {
            let embedded = self.embedder.embed_batch(batch).await?;
            if embedded.len() != batch.len() {
                return Err(Error::EmbeddingProviderUnavailable(format!(
                    "provider returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
            pb.set_position(vectors.len() as u64);
        }
        pb.finish_with_message("embedded");
        Ok(vectors)
    }
}
