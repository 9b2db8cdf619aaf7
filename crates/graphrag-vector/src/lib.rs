//! Flat embedding store persisted as one JSON blob.
//!
//! The store is bound to a single artifact path at construction; `add_texts`
//! writes it, `load()` reads it back whole. There is no partial loading and
//! no schema version: a blob written by a different embedder is only logged.
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use graphrag_core::error::{Error, Result};
use graphrag_core::traits::{Embedder, Retriever, VectorIndex};
use graphrag_core::types::{ChunkId, ChunkMetadata, RetrievedDocument, SourceKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorArtifact {
    embedder_id: String,
    dim: usize,
    entries: Vec<VectorEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub metadata: ChunkMetadata,
    pub score: f32,
}

pub struct VectorStore {
    path: PathBuf,
    embedder: Box<dyn Embedder>,
    entries: Vec<VectorEntry>,
    by_chunk: HashMap<ChunkId, usize>,
    dim: usize,
}

impl VectorStore {
    pub fn new(path: impl Into<PathBuf>, embedder: Box<dyn Embedder>) -> Self {
        Self { path: path.into(), embedder, entries: Vec::new(), by_chunk: HashMap::new(), dim: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, chunk_id: &str) -> Option<&ChunkMetadata> {
        self.by_chunk.get(chunk_id).map(|&i| &self.entries[i].metadata)
    }

    pub fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<VectorHit>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let q = self.embedder.embed_query(query)?;
        if q.len() != self.dim {
            return Err(Error::ExternalService(format!(
                "query embedding has {} dims, store has {}",
                q.len(),
                self.dim
            )));
        }
        let mut scored: Vec<(usize, f32)> =
            self.entries.iter().enumerate().map(|(i, e)| (i, cosine(&q, &e.embedding))).collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(i, score)| VectorHit { metadata: self.entries[i].metadata.clone(), score })
            .collect())
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let artifact = VectorArtifact {
            embedder_id: self.embedder.embedder_id().to_string(),
            dim: self.dim,
            entries: self.entries.clone(),
        };
        fs::write(&self.path, serde_json::to_vec(&artifact)?)?;
        tracing::info!(path = %self.path.display(), entries = self.entries.len(), "vector artifact written");
        Ok(())
    }

    fn reindex(&mut self) {
        self.by_chunk = self.entries.iter().enumerate().map(|(i, e)| (e.metadata.chunk_id.clone(), i)).collect();
    }
}

impl VectorIndex for VectorStore {
    fn add_texts(&mut self, texts: &[String], metadata: &[ChunkMetadata]) -> Result<()> {
        if texts.len() != metadata.len() {
            return Err(Error::InvalidInput(format!(
                "{} texts but {} metadata records",
                texts.len(),
                metadata.len()
            )));
        }
        if let Some((i, _)) = texts.iter().zip(metadata).enumerate().find(|(_, (t, m))| **t != m.text) {
            return Err(Error::InvalidInput(format!("text and metadata disagree at position {i}")));
        }
        if texts.is_empty() {
            return self.save();
        }

        let embeddings = self.embedder.embed_batch(texts)?;
        if embeddings.len() != texts.len() {
            return Err(Error::ExternalService(format!(
                "embedder returned {} vectors for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }
        let dim = if self.dim == 0 { embeddings[0].len() } else { self.dim };
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
            return Err(Error::ExternalService(format!("embedding has {} dims, expected {dim}", bad.len())));
        }
        self.dim = dim;
        self.entries.extend(
            metadata.iter().cloned().zip(embeddings).map(|(metadata, embedding)| VectorEntry { metadata, embedding }),
        );
        self.reindex();
        self.save()
    }

    fn load(&mut self) -> Result<()> {
        let raw = fs::read(&self.path)?;
        let artifact: VectorArtifact = serde_json::from_slice(&raw).map_err(|e| Error::malformed(&self.path, e))?;
        if let Some(bad) = artifact.entries.iter().find(|e| e.embedding.len() != artifact.dim) {
            return Err(Error::malformed(
                &self.path,
                format!("{} has {} dims, header says {}", bad.metadata.chunk_id, bad.embedding.len(), artifact.dim),
            ));
        }
        if artifact.embedder_id != self.embedder.embedder_id() {
            tracing::warn!(
                stored = %artifact.embedder_id,
                current = %self.embedder.embedder_id(),
                "vector artifact was written by a different embedder"
            );
        }
        self.dim = artifact.dim;
        self.entries = artifact.entries;
        self.reindex();
        tracing::info!(path = %self.path.display(), entries = self.entries.len(), "vector artifact loaded");
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Retriever for VectorStore {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        Ok(self
            .similarity_search(query, k)?
            .into_iter()
            .map(|hit| RetrievedDocument {
                chunk_id: Some(hit.metadata.chunk_id),
                title: hit.metadata.display_title,
                content: hit.metadata.text,
                score: hit.score,
                source: SourceKind::Vector,
            })
            .collect())
    }
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}
