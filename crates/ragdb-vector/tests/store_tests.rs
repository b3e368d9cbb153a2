use std::fs;
use tempfile::TempDir;

use ragdb_core::{Chunk, Error, Meta};
use ragdb_vector::{read_manifest, VectorIndexStore, DOCSTORE_FILE, MANIFEST_FILE, VECTORS_FILE};

fn chunk(text: &str, source: &str) -> Chunk {
    let mut metadata = Meta::new();
    metadata.insert("source".to_string(), source.to_string());
    Chunk { text: text.to_string(), source_path: source.to_string(), metadata }
}

/// Deterministic, distinct 4-d vectors.
fn vector(i: usize) -> Vec<f32> {
    let x = i as f32 + 1.0;
    vec![x.sin(), x.cos(), (x * 0.5).sin(), 1.0]
}

fn fixture(range: std::ops::Range<usize>) -> (Vec<Chunk>, Vec<Vec<f32>>) {
    let chunks = range.clone().map(|i| chunk(&format!("chunk {i}"), "/docs/a.txt")).collect();
    let vectors = range.map(vector).collect();
    (chunks, vectors)
}

#[test]
fn create_save_load_roundtrip_preserves_docstore_and_results() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join("index");
    let (chunks, vectors) = fixture(0..6);
    let store = VectorIndexStore::create(chunks.clone(), vectors, "hash:4")?;
    store.save(&dir)?;

    assert!(VectorIndexStore::exists(&dir));
    let (loaded, err) = VectorIndexStore::load_or_create(&dir);
    assert!(err.is_none());
    assert_eq!(loaded.len(), 6);
    assert_eq!(loaded.dim(), 4);
    assert_eq!(loaded.embedder_id(), Some("hash:4"));
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(loaded.get(&i.to_string()), Some(c));
    }

    let query = vector(2);
    let before: Vec<_> = store.search(&query, 3)?.into_iter().map(|h| (h.id, h.score)).collect();
    let after: Vec<_> = loaded.search(&query, 3)?.into_iter().map(|h| (h.id, h.score)).collect();
    assert_eq!(before, after);
    assert_eq!(after[0].0, "2");

    let manifest = read_manifest(&dir)?;
    assert_eq!(manifest.entries, 6);
    assert_eq!(manifest.dim, 4);
    Ok(())
}

#[test]
fn merging_in_two_steps_equals_one_merge() -> anyhow::Result<()> {
    let (a_chunks, a_vectors) = fixture(0..3);
    let (b_chunks, b_vectors) = fixture(3..7);

    let mut stepwise = VectorIndexStore::new();
    let first = stepwise.merge(a_chunks.clone(), a_vectors.clone(), "e")?;
    let second = stepwise.merge(b_chunks.clone(), b_vectors.clone(), "e")?;
    assert_eq!(first, vec!["0", "1", "2"]);
    assert_eq!(second, vec!["3", "4", "5", "6"]);

    let mut at_once = VectorIndexStore::new();
    let all_chunks: Vec<_> = a_chunks.into_iter().chain(b_chunks).collect();
    let all_vectors: Vec<_> = a_vectors.into_iter().chain(b_vectors).collect();
    at_once.merge(all_chunks, all_vectors, "e")?;

    assert_eq!(stepwise.len(), at_once.len());
    for i in 0..7 {
        let id = i.to_string();
        assert_eq!(stepwise.get(&id), at_once.get(&id));
    }
    let q = vector(5);
    let s: Vec<_> = stepwise.search(&q, 7)?.into_iter().map(|h| h.id).collect();
    let o: Vec<_> = at_once.search(&q, 7)?.into_iter().map(|h| h.id).collect();
    assert_eq!(s, o);
    stepwise.check_invariant()?;
    Ok(())
}

#[test]
fn merge_into_reloaded_store_continues_ids() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let (chunks, vectors) = fixture(0..2);
    VectorIndexStore::create(chunks, vectors, "e")?.save(tmp.path())?;

    let (mut store, err) = VectorIndexStore::load_or_create(tmp.path());
    assert!(err.is_none());
    let (more, more_vectors) = fixture(2..4);
    let ids = store.merge(more, more_vectors, "e")?;
    assert_eq!(ids, vec!["2", "3"]);
    store.save(tmp.path())?;

    let reloaded = VectorIndexStore::load(tmp.path())?;
    assert_eq!(reloaded.len(), 4);
    assert_eq!(reloaded.id_map().len(), 4);
    reloaded.check_invariant()?;
    Ok(())
}

#[test]
fn search_returns_min_k_n_in_descending_order() -> anyhow::Result<()> {
    let (chunks, vectors) = fixture(0..5);
    let store = VectorIndexStore::create(chunks, vectors, "e")?;
    let q = vector(1);

    assert!(store.search(&q, 0)?.is_empty());
    for k in [1, 3, 5, 9] {
        let hits = store.search(&q, k)?;
        assert_eq!(hits.len(), k.min(5));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    let err = store.search(&[1.0, 0.0], 2).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 4, actual: 2 }));
    Ok(())
}

#[test]
fn equal_scores_prefer_lower_ids() -> anyhow::Result<()> {
    let chunks = vec![chunk("x", "a"), chunk("y", "b"), chunk("z", "c")];
    let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]];
    let store = VectorIndexStore::create(chunks, vectors, "e")?;
    let ids: Vec<_> = store.search(&[1.0, 0.0], 3)?.into_iter().map(|h| h.id).collect();
    assert_eq!(ids, vec!["0", "2", "1"]);
    Ok(())
}

#[test]
fn create_rejects_length_mismatch() {
    let (chunks, mut vectors) = fixture(0..3);
    vectors.pop();
    let err = VectorIndexStore::create(chunks, vectors, "e").unwrap_err();
    assert!(matches!(err, Error::LengthMismatch { chunks: 3, vectors: 2 }));
}

#[test]
fn tampered_files_are_rejected_and_fall_back_to_empty() -> anyhow::Result<()> {
    for name in [VECTORS_FILE, DOCSTORE_FILE] {
        let tmp = TempDir::new()?;
        let (chunks, vectors) = fixture(0..3);
        VectorIndexStore::create(chunks, vectors, "e")?.save(tmp.path())?;

        let path = tmp.path().join(name);
        let mut bytes = fs::read(&path)?;
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        fs::write(&path, bytes)?;

        let err = VectorIndexStore::load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::IndexCorruption(_)), "{name}: {err:?}");

        let (store, err) = VectorIndexStore::load_or_create(tmp.path());
        assert!(store.is_empty());
        assert!(err.is_some());
    }
    Ok(())
}

#[test]
fn missing_files_fail_closed() -> anyhow::Result<()> {
    for name in [VECTORS_FILE, DOCSTORE_FILE, MANIFEST_FILE] {
        let tmp = TempDir::new()?;
        let (chunks, vectors) = fixture(0..2);
        VectorIndexStore::create(chunks, vectors, "e")?.save(tmp.path())?;
        fs::remove_file(tmp.path().join(name))?;

        let err = VectorIndexStore::load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::StorageIo { .. }), "{name}: {err:?}");
    }
    Ok(())
}

#[test]
fn load_or_create_on_missing_directory_is_empty() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("does-not-exist");
    assert!(!VectorIndexStore::exists(&dir));
    let (store, err) = VectorIndexStore::load_or_create(&dir);
    assert!(store.is_empty());
    assert!(matches!(err, Some(Error::StorageIo { .. })));
}

#[test]
fn vectors_from_another_embedder_are_rejected() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let (chunks, vectors) = fixture(0..2);
    VectorIndexStore::create(chunks, vectors, "openai:text-embedding-3-small")?.save(tmp.path())?;

    let mut store = VectorIndexStore::load(tmp.path())?;
    let (more, more_vectors) = fixture(2..3);
    let err = store.merge(more, more_vectors, "hash:4").unwrap_err();
    assert!(matches!(err, Error::EmbedderMismatch { .. }));
    assert_eq!(store.len(), 2);
    Ok(())
}
