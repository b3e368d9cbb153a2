use ragdb_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use ragdb_embed::build_embedder;

#[tokio::test]
async fn hash_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { provider: EmbeddingProviderKind::Hash, dim: 128, ..Default::default() };
    let embedder = build_embedder(&settings);
    assert_eq!(embedder.embedder_id(), "hash:128");

    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).await.expect("embed_batch");
    assert_eq!(embs.len(), 2);
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 128, "embedding dim follows settings");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }

    let one = embedder.embed_one("hello world").await.expect("embed_one");
    assert_eq!(&one, v1);
}

#[test]
fn openai_is_the_default_provider() {
    let embedder = build_embedder(&EmbeddingSettings::default());
    assert_eq!(embedder.embedder_id(), "openai:text-embedding-3-small");
}
