//! Domain types shared by the indexing and query paths.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type ChunkId = String;

/// Join key shared by the graph and vector artifacts.
pub fn chunk_id_for(sequence_index: usize) -> ChunkId {
    format!("chunk_{sequence_index}")
}

/// A contiguous slice of the corpus, the unit both indices are keyed by.
///
/// `chunk_id` is always `chunk_<sequence_index>` and is assigned exactly once,
/// by the orchestrator, before either index sees the chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: ChunkId,
    pub text: String,
    pub sequence_index: usize,
}

impl ChunkRecord {
    pub fn new(sequence_index: usize, text: impl Into<String>) -> Self {
        Self { chunk_id: chunk_id_for(sequence_index), text: text.into(), sequence_index }
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            text: self.text.clone(),
            chunk_id: self.chunk_id.clone(),
            display_title: format!("Document chunk {}", self.sequence_index),
        }
    }
}

/// Per-chunk payload stored next to each embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub text: String,
    pub chunk_id: ChunkId,
    pub display_title: String,
}

/// Indicates which retrieval path produced a document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Graph,
    Vector,
    Keyword,
}

/// What a retriever hands to the generator.
///
/// `score` is retriever-specific but higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub chunk_id: Option<ChunkId>,
    pub title: String,
    pub content: String,
    pub score: f32,
    pub source: SourceKind,
}

impl RetrievedDocument {
    /// Identity used when merging results from several retrievers.
    pub fn dedup_key(&self) -> &str {
        self.chunk_id.as_deref().unwrap_or(&self.title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Entity neighbourhoods from the knowledge graph.
    Graph,
    /// Pure embedding similarity.
    Vector,
    /// Embedding similarity fused with graph keyword hits.
    Hybrid,
    /// Graph and hybrid results interleaved.
    Combined,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Graph => "graph",
            Strategy::Vector => "vector",
            Strategy::Hybrid => "hybrid",
            Strategy::Combined => "combined",
        }
    }

    /// Lenient parse for model output ("GraphRAG", "hybrid_traditional", ...).
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let s = raw.trim().to_lowercase();
        if s.contains("combin") {
            Some(Strategy::Combined)
        } else if s.contains("hybrid") || s.contains("traditional") {
            Some(Strategy::Hybrid)
        } else if s.contains("graph") {
            Some(Strategy::Graph)
        } else if s.contains("vector") || s.contains("semantic") {
            Some(Strategy::Vector)
        } else {
            None
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing decision for one question. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAnalysis {
    pub recommended_strategy: Strategy,
    pub confidence: f32,
    pub reasoning: String,
}

impl RouteAnalysis {
    pub fn new(recommended_strategy: Strategy, confidence: f32, reasoning: impl Into<String>) -> Self {
        let confidence = if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 };
        Self { recommended_strategy, confidence, reasoning: reasoning.into() }
    }
}

/// Single-turn prompt sent to a chat model.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub model: String,
    pub system: Option<String>,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub chunks: usize,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} nodes, {} edges, {} chunks", self.nodes, self.edges, self.chunks)
    }
}
