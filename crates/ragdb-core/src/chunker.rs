//! Recursive character splitter.
//!
//! Text is cut on the first separator (in preference order) that occurs in it,
//! keeping the separator at the start of the following piece. Small pieces are
//! merged greedily into windows of at most `chunk_size` characters; consecutive
//! windows share up to `chunk_overlap` trailing characters. A piece that is
//! still too large is split again with the remaining separators, or emitted
//! whole when none are left. Lengths are counted in chars, not bytes.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{Chunk, DocumentRecord, META_CHUNK_INDEX};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200, separators: vec!["\n".to_string()] }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be > 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split every record, preserving record order and the order of windows
    /// within a record. Chunks inherit the record's metadata plus `chunk_index`.
    pub fn split_documents(&self, records: &[DocumentRecord]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for record in records {
            let pieces = self.split_text(&record.text);
            debug!(source = %record.source_path, chunks = pieces.len(), "split record");
            for (chunk_index, text) in pieces.into_iter().enumerate() {
                let mut metadata = record.metadata.clone();
                metadata.insert(META_CHUNK_INDEX.to_string(), chunk_index.to_string());
                chunks.push(Chunk { text, source_path: record.source_path.clone(), metadata });
            }
        }
        chunks
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.config.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, remaining) = pick_separator(text, separators);
        let mut output = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                output.extend(self.merge_pieces(&pending));
                pending.clear();
            }
            if remaining.is_empty() {
                push_trimmed(&mut output, piece);
            } else {
                output.extend(self.split_recursive(piece, remaining));
            }
        }
        if !pending.is_empty() {
            output.extend(self.merge_pieces(&pending));
        }
        output
    }

    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let mut output = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > size && !window.is_empty() {
                if total > size {
                    warn!(total, size, "created a chunk larger than the configured size");
                }
                push_trimmed(&mut output, &join_window(&window));
                // Keep at most `overlap` trailing characters, and only as many as
                // still leave room for the next piece.
                while total > overlap || (total + len > size && total > 0) {
                    match window.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        if !window.is_empty() {
            push_trimmed(&mut output, &join_window(&window));
        }
        output
    }
}

fn pick_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep.as_str()) {
            return (sep.as_str(), &separators[i + 1..]);
        }
    }
    (separators.last().map_or("", String::as_str), &[])
}

/// Split on `separator`, keeping it at the start of each following piece.
/// An empty separator splits into single characters. Empty pieces are dropped.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_window(window: &VecDeque<(&str, usize)>) -> String {
    window.iter().map(|(piece, _)| *piece).collect()
}

fn push_trimmed(output: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        output.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
