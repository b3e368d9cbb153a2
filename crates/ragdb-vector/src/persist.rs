//! On-disk layout of a store directory:
//!
//! - `index.vec`: magic, format version, dimension and row count followed by
//!   the rows as little-endian `f32`;
//! - `index.json`: document store, id map, dimension and embedder id;
//! - `manifest.json`: counts plus blake3 digests of the two files above.
//!
//! Each file is written to a temporary file in the same directory and renamed
//! into place. The manifest goes last and is the commit point: a store whose
//! data files do not match the manifest digests fails to load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use ragdb_core::{Chunk, ChunkId, Error, Result};

use crate::flat::FlatIndex;
use crate::store::{IdMap, VectorIndexStore};

pub const VECTORS_FILE: &str = "index.vec";
pub const DOCSTORE_FILE: &str = "index.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const FORMAT_VERSION: u32 = 1;

const MAGIC: &[u8; 8] = b"RAGDBVEC";
const HEADER_LEN: usize = 8 + 4 + 4 + 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub entries: usize,
    pub dim: usize,
    pub embedder_id: Option<String>,
    pub vectors_blake3: String,
    pub docstore_blake3: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct DocstoreRef<'a> {
    dim: usize,
    embedder_id: Option<&'a str>,
    id_map: &'a IdMap,
    docstore: &'a BTreeMap<ChunkId, Chunk>,
}

#[derive(Deserialize)]
struct DocstoreFile {
    dim: usize,
    embedder_id: Option<String>,
    id_map: IdMap,
    docstore: BTreeMap<ChunkId, Chunk>,
}

pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

pub fn read_manifest(dir: &Path) -> Result<Manifest> {
    let path = manifest_path(dir);
    let bytes = fs::read(&path).map_err(|e| Error::storage_io(&path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::IndexCorruption(format!("{}: {e}", path.display())))
}

pub(crate) fn write_store(store: &VectorIndexStore, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::storage_io(dir, e))?;

    let vectors = encode_vectors(&store.index);
    let docstore = serde_json::to_vec(&DocstoreRef {
        dim: store.index.dim(),
        embedder_id: store.embedder_id.as_deref(),
        id_map: &store.id_map,
        docstore: &store.docstore,
    })
    .map_err(|e| Error::IndexCorruption(format!("failed to serialize document store: {e}")))?;

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        entries: store.len(),
        dim: store.index.dim(),
        embedder_id: store.embedder_id.clone(),
        vectors_blake3: blake3::hash(&vectors).to_hex().to_string(),
        docstore_blake3: blake3::hash(&docstore).to_hex().to_string(),
        saved_at: Utc::now(),
    };
    let manifest = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| Error::IndexCorruption(format!("failed to serialize manifest: {e}")))?;

    write_atomic(dir, VECTORS_FILE, &vectors)?;
    write_atomic(dir, DOCSTORE_FILE, &docstore)?;
    write_atomic(dir, MANIFEST_FILE, &manifest)
}

pub(crate) fn read_store(dir: &Path) -> Result<VectorIndexStore> {
    let manifest = read_manifest(dir)?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(Error::IndexCorruption(format!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            manifest.format_version
        )));
    }

    let vectors = read_verified(dir, VECTORS_FILE, &manifest.vectors_blake3)?;
    let docstore = read_verified(dir, DOCSTORE_FILE, &manifest.docstore_blake3)?;

    let index = decode_vectors(&vectors)?;
    let file: DocstoreFile = serde_json::from_slice(&docstore)
        .map_err(|e| Error::IndexCorruption(format!("{DOCSTORE_FILE}: {e}")))?;

    if index.dim() != file.dim || index.dim() != manifest.dim {
        return Err(Error::IndexCorruption(format!(
            "dimension disagreement: vectors {}, document store {}, manifest {}",
            index.dim(),
            file.dim,
            manifest.dim
        )));
    }
    if file.docstore.len() != manifest.entries {
        return Err(Error::IndexCorruption(format!(
            "manifest lists {} entries, document store has {}",
            manifest.entries,
            file.docstore.len()
        )));
    }

    let store = VectorIndexStore {
        index,
        docstore: file.docstore,
        id_map: file.id_map,
        embedder_id: file.embedder_id,
    };
    store.check_invariant()?;
    Ok(store)
}

fn read_verified(dir: &Path, name: &str, expected: &str) -> Result<Vec<u8>> {
    let path = dir.join(name);
    let bytes = fs::read(&path).map_err(|e| Error::storage_io(&path, e))?;
    let actual = blake3::hash(&bytes).to_hex().to_string();
    if actual != expected {
        return Err(Error::IndexCorruption(format!("{name}: checksum mismatch")));
    }
    Ok(bytes)
}

fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let target = dir.join(name);
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::storage_io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| Error::storage_io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::storage_io(tmp.path(), e))?;
    tmp.persist(&target).map_err(|e| Error::storage_io(&target, e.error))?;
    Ok(())
}

fn encode_vectors(index: &FlatIndex) -> Vec<u8> {
    let data = index.as_slice();
    let mut out = Vec::with_capacity(HEADER_LEN + data.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(index.dim() as u32).to_le_bytes());
    out.extend_from_slice(&(index.len() as u64).to_le_bytes());
    for x in data {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

fn decode_vectors(bytes: &[u8]) -> Result<FlatIndex> {
    let corrupt = |msg: &str| Error::IndexCorruption(format!("{VECTORS_FILE}: {msg}"));
    if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
        return Err(corrupt("bad header"));
    }
    let read_u32 = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let version = read_u32(8);
    if version != FORMAT_VERSION {
        return Err(corrupt(&format!("unsupported version {version}")));
    }
    let dim = read_u32(12) as usize;
    let mut rows = [0u8; 8];
    rows.copy_from_slice(&bytes[16..24]);
    let rows = u64::from_le_bytes(rows) as usize;

    let body = &bytes[HEADER_LEN..];
    if body.len() % 4 != 0 || body.len() / 4 != rows * dim {
        return Err(corrupt(&format!("expected {rows} rows of dimension {dim}")));
    }
    let data = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    FlatIndex::from_raw(dim, data)
}
