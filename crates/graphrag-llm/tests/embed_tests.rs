use graphrag_core::config::LlmSettings;
use graphrag_core::traits::Embedder;
use graphrag_core::Error;
use graphrag_llm::{get_default_embedder, FakeEmbedder, LlmService};

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::default();
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 256, "embedding dim is 256");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn fake_embedder_separates_unrelated_texts() {
    let embedder = FakeEmbedder::default();
    let q = embedder.embed_query("红烧肉 的 做法").unwrap();
    let near = embedder.embed_query("红烧肉 需要 五花肉").unwrap();
    let far = embedder.embed_query("quantum chromodynamics").unwrap();
    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    assert!(dot(&q, &near) > dot(&q, &far));
}

#[test]
fn service_refuses_placeholder_key() {
    let settings = LlmSettings { api_key: Some("sk-your-key-here".to_string()), ..LlmSettings::default() };
    let err = LlmService::new(&settings).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn env_switch_selects_fake_embedder() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let settings = LlmSettings { api_key: Some("sk-test".to_string()), ..LlmSettings::default() };
    let service = LlmService::new(&settings).expect("service");
    let embedder = get_default_embedder(&service, &settings.embedding_model);
    assert!(embedder.embedder_id().starts_with("fake:"));
}
