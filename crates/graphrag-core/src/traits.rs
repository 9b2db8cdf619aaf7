use std::path::Path;

use crate::error::Result;
use crate::types::{ChunkMetadata, GraphStats, Prompt, RetrievedDocument, RouteAnalysis};

/// Splits corpus text into an ordered sequence of chunk texts.
///
/// Same input and same settings must produce the same chunks.
pub trait Chunker {
    fn chunk(&self, text: &str) -> Result<Vec<String>>;
}

pub trait LanguageModel: Send + Sync {
    fn complete(&self, prompt: &Prompt) -> Result<String>;
}

pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g., `api:BAAI/bge-large-zh-v1.5`).
    fn embedder_id(&self) -> &str;
    /// Vectors come back L2-normalized, one per input, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| crate::error::Error::ExternalService("embedder returned no vector".to_string()))
    }
}

/// Graph side of the index pair. Owns its own persistence and derived lookups.
pub trait GraphIndex {
    /// Processes chunks in order, merging every extraction into one graph.
    fn index_chunks(&mut self, chunks: &[crate::types::ChunkRecord]) -> Result<()>;
    fn save_to(&self, path: &Path) -> Result<()>;
    /// Replaces the in-memory graph with the persisted one and rebuilds all
    /// derived lookups. Never calls the extractor.
    fn load_from(&mut self, path: &Path) -> Result<()>;
    fn statistics(&self) -> GraphStats;
}

/// Vector side of the index pair. Bound to one artifact path at construction.
pub trait VectorIndex {
    /// `texts[i]` and `metadata[i]` describe the same chunk.
    fn add_texts(&mut self, texts: &[String], metadata: &[ChunkMetadata]) -> Result<()>;
    fn load(&mut self) -> Result<()>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait Retriever {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>>;
}

pub trait QueryRouter {
    fn route_query(&self, question: &str, top_k: usize) -> Result<(Vec<RetrievedDocument>, RouteAnalysis)>;
}

pub trait AnswerGenerator {
    fn generate_adaptive_answer(&self, question: &str, documents: &[RetrievedDocument]) -> Result<String>;
}

impl<T: Retriever + ?Sized> Retriever for std::sync::Arc<T> {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        (**self).retrieve(query, k)
    }
}
