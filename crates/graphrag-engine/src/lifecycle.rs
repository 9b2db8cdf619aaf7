//! Build-or-load orchestration for the graph and vector artifacts.
//!
//! Both artifacts present means load; anything else means build from the
//! corpus. The build is not transactional: a crash between writing the graph
//! and finishing vector ingestion leaves one file behind. That half-built
//! state fails the "both present" check, so the next run deletes the leftover
//! file and rebuilds both. A failed build is not rolled back.
use std::fs;
use std::io;
use std::path::Path;

use graphrag_core::config::ArtifactPaths;
use graphrag_core::error::{Error, Result};
use graphrag_core::traits::{Chunker, GraphIndex, VectorIndex};
use graphrag_core::types::{ChunkMetadata, ChunkRecord, GraphStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Complete,
    GraphOnly,
    VectorOnly,
    Absent,
}

impl ArtifactState {
    pub fn detect(paths: &ArtifactPaths) -> Self {
        match (paths.graph.exists(), paths.vector.exists()) {
            (true, true) => ArtifactState::Complete,
            (true, false) => ArtifactState::GraphOnly,
            (false, true) => ArtifactState::VectorOnly,
            (false, false) => ArtifactState::Absent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    Built { chunks: usize },
    Loaded,
}

/// Ready-to-query handles plus how they were obtained.
pub struct Indices<G, V> {
    pub graph: G,
    pub vectors: V,
    pub origin: IndexOrigin,
}

impl<G: GraphIndex, V> Indices<G, V> {
    pub fn graph_stats(&self) -> GraphStats {
        self.graph.statistics()
    }
}

pub struct IndexLifecycle<C, G, V> {
    paths: ArtifactPaths,
    chunker: C,
    graph: G,
    vectors: V,
}

impl<C, G, V> IndexLifecycle<C, G, V>
where
    C: Chunker,
    G: GraphIndex,
    V: VectorIndex,
{
    /// `vectors` must already be bound to `paths.vector`.
    pub fn new(paths: ArtifactPaths, chunker: C, graph: G, vectors: V) -> Self {
        Self { paths, chunker, graph, vectors }
    }

    pub fn ensure_indices(self) -> Result<Indices<G, V>> {
        match ArtifactState::detect(&self.paths) {
            ArtifactState::Complete => self.load(),
            ArtifactState::Absent => self.build(),
            partial => {
                tracing::warn!(state = ?partial, "found a half-built index, rebuilding both artifacts");
                clear_artifacts(&self.paths)?;
                self.build()
            }
        }
    }

    fn load(mut self) -> Result<Indices<G, V>> {
        tracing::info!(graph = %self.paths.graph.display(), vector = %self.paths.vector.display(), "loading existing indices");
        self.graph.load_from(&self.paths.graph)?;
        self.vectors.load()?;
        tracing::info!(stats = %self.graph.statistics(), vectors = self.vectors.len(), "indices loaded");
        Ok(Indices { graph: self.graph, vectors: self.vectors, origin: IndexOrigin::Loaded })
    }

    fn build(mut self) -> Result<Indices<G, V>> {
        let text = read_corpus(&self.paths.corpus)?;
        tracing::info!(corpus = %self.paths.corpus.display(), chars = text.chars().count(), "building indices");
        match self.run_build(&text) {
            Ok(chunks) => {
                tracing::info!(chunks, stats = %self.graph.statistics(), "index build completed");
                Ok(Indices { graph: self.graph, vectors: self.vectors, origin: IndexOrigin::Built { chunks } })
            }
            Err(e) => {
                tracing::error!(error = %e, "index build failed");
                Err(Error::build_failed(e))
            }
        }
    }

    fn run_build(&mut self, text: &str) -> Result<usize> {
        let records: Vec<ChunkRecord> =
            self.chunker.chunk(text)?.into_iter().enumerate().map(|(i, t)| ChunkRecord::new(i, t)).collect();
        if records.is_empty() {
            tracing::warn!("corpus produced no chunks");
        }
        tracing::info!(chunks = records.len(), "chunking completed");

        self.graph.index_chunks(&records)?;
        self.graph.save_to(&self.paths.graph)?;

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let metadata: Vec<ChunkMetadata> = records.iter().map(ChunkRecord::metadata).collect();
        self.vectors.add_texts(&texts, &metadata)?;
        tracing::info!(vectors = self.vectors.len(), "vector index built");
        Ok(records.len())
    }
}

/// Deletes whichever artifacts exist so the next run rebuilds from scratch.
pub fn clear_artifacts(paths: &ArtifactPaths) -> Result<()> {
    for path in [&paths.graph, &paths.vector] {
        match fs::remove_file(path) {
            Ok(()) => tracing::info!(path = %path.display(), "artifact removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn read_corpus(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::InputMissing(path.to_path_buf())),
        Err(e) => Err(Error::build_failed(e.into())),
    }
}
