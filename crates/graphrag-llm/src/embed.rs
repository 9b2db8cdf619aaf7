//! Embedding providers.
//!
//! Respects `APP_USE_FAKE_EMBEDDINGS=1` to switch to the [`FakeEmbedder`] for
//! fast and deterministic outputs in tests and development.
use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use graphrag_core::error::Result;
use graphrag_core::traits::Embedder;

use crate::LlmService;

const BATCH_SIZE: usize = 32;
const FAKE_DIM: usize = 256;

pub struct ApiEmbedder {
    service: LlmService,
    model: String,
    id: String,
}

impl ApiEmbedder {
    pub fn new(service: LlmService, model: impl Into<String>) -> Self {
        let model = model.into();
        let id = format!("api:{model}");
        Self { service, model, id }
    }
}

impl Embedder for ApiEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let mut vectors = self.service.embed(&self.model, batch)?;
            for v in &mut vectors {
                l2_normalize(v);
            }
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// Hashed bag-of-tokens vectors. CJK text is tokenized per character.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("fake:xxhash:d{dim}") }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in tokens(text).enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        Self::new(FAKE_DIM)
    }
}

impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).flat_map(|word| {
        if word.is_ascii() {
            vec![word.to_lowercase()]
        } else {
            word.chars().map(|c| c.to_lowercase().collect::<String>()).collect()
        }
    })
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
    for x in v.iter_mut() {
        *x /= norm;
    }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn get_default_embedder(service: &LlmService, model: &str) -> Box<dyn Embedder> {
    if use_fake_embeddings() {
        tracing::info!("using FakeEmbedder");
        return Box::new(FakeEmbedder::default());
    }
    Box::new(ApiEmbedder::new(service.clone(), model))
}
