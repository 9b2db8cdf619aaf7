use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Map;

use graphrag_core::error::{Error, Result};
use graphrag_core::traits::GraphIndex;
use graphrag_core::types::{ChunkId, ChunkRecord, GraphStats};

use crate::extract::{EntityExtractor, Extraction};
use crate::model::{node_key, Entity, LinkRecord, NodeLinkGraph, NodeRecord, Relation};

const MIN_MATCH_CHARS: usize = 2;

/// Cumulative knowledge graph plus the lookups derived from it.
///
/// The graph itself (`nodes`, `links`) is the only state that is persisted;
/// every `HashMap` below is rebuilt from it by [`GraphIndexer::rebuild_indices`].
pub struct GraphIndexer {
    extractor: Box<dyn EntityExtractor>,
    graph: NodeLinkGraph,
    node_index: HashMap<String, usize>,
    edge_index: HashMap<(String, String, String), usize>,
    chunk_entities: HashMap<ChunkId, Vec<usize>>,
    adjacency: HashMap<usize, Vec<usize>>,
}

impl GraphIndexer {
    pub fn new(extractor: Box<dyn EntityExtractor>) -> Self {
        Self {
            extractor,
            graph: NodeLinkGraph::default(),
            node_index: HashMap::new(),
            edge_index: HashMap::new(),
            chunk_entities: HashMap::new(),
            adjacency: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &NodeLinkGraph {
        &self.graph
    }

    pub fn node(&self, idx: usize) -> Option<&NodeRecord> {
        self.graph.nodes.get(idx)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&NodeRecord> {
        self.node_index.get(&node_key(name)).and_then(|&i| self.graph.nodes.get(i))
    }

    pub fn entities_in_chunk(&self, chunk_id: &str) -> impl Iterator<Item = &NodeRecord> {
        self.chunk_entities.get(chunk_id).into_iter().flatten().filter_map(|&i| self.graph.nodes.get(i))
    }

    /// Links touching node `idx`, in either direction.
    pub fn links_of(&self, idx: usize) -> impl Iterator<Item = &LinkRecord> {
        self.adjacency.get(&idx).into_iter().flatten().filter_map(|&e| self.graph.links.get(e))
    }

    /// Every chunk id referenced by any node or link.
    pub fn referenced_chunks(&self) -> BTreeSet<&str> {
        let from_nodes = self.graph.nodes.iter().flat_map(|n| n.entity.source_chunks.iter());
        let from_links = self.graph.links.iter().flat_map(|l| l.relation.source_chunks.iter());
        from_nodes.chain(from_links).map(String::as_str).collect()
    }

    fn merge_extraction(&mut self, chunk_id: &ChunkId, extraction: Extraction) {
        for e in extraction.entities {
            self.upsert_entity(&e.name, &e.entity_type, &e.description, chunk_id);
        }
        for r in extraction.relations {
            let (Some(s), Some(t)) = (
                self.upsert_entity(&r.source, "", "", chunk_id),
                self.upsert_entity(&r.target, "", "", chunk_id),
            ) else {
                continue;
            };
            let source = self.graph.nodes[s].id.clone();
            let target = self.graph.nodes[t].id.clone();
            let key = (source.clone(), target.clone(), r.relation.trim().to_lowercase());
            match self.edge_index.get(&key) {
                Some(&idx) => {
                    let rel = &mut self.graph.links[idx].relation;
                    rel.stored_weight = Some(rel.weight() + 1.0);
                    append_description(&mut rel.description, &r.description);
                    push_unique(&mut rel.source_chunks, chunk_id);
                }
                None => {
                    self.edge_index.insert(key, self.graph.links.len());
                    self.graph.links.push(LinkRecord::new(
                        source,
                        target,
                        Relation {
                            relation: r.relation.trim().to_string(),
                            description: r.description.trim().to_string(),
                            stored_weight: Some(1.0),
                            source_chunks: vec![chunk_id.clone()],
                            extra: Map::new(),
                        },
                    ));
                }
            }
        }
    }

    /// Repeated names across chunks collapse into one node. Endpoints of a
    /// relation that were never listed as entities become placeholder nodes.
    fn upsert_entity(&mut self, name: &str, entity_type: &str, description: &str, chunk_id: &ChunkId) -> Option<usize> {
        let key = node_key(name);
        if key.is_empty() {
            return None;
        }
        if let Some(&idx) = self.node_index.get(&key) {
            let entity = &mut self.graph.nodes[idx].entity;
            let untyped = entity.entity_type.is_empty() || entity.entity_type == "unknown";
            if untyped && !entity_type.trim().is_empty() {
                entity.entity_type = entity_type.trim().to_string();
            }
            append_description(&mut entity.description, description);
            push_unique(&mut entity.source_chunks, chunk_id);
            return Some(idx);
        }
        let idx = self.graph.nodes.len();
        let entity_type = if entity_type.trim().is_empty() { "unknown" } else { entity_type.trim() };
        self.graph.nodes.push(NodeRecord::new(
            key.clone(),
            Entity {
                name: name.trim().to_string(),
                entity_type: entity_type.to_string(),
                description: description.trim().to_string(),
                source_chunks: vec![chunk_id.clone()],
                extra: Map::new(),
            },
        ));
        self.node_index.insert(key, idx);
        Some(idx)
    }

    /// Recomputes every derived lookup from the node-link graph. Idempotent.
    pub fn rebuild_indices(&mut self) {
        self.node_index.clear();
        self.edge_index.clear();
        self.chunk_entities.clear();
        self.adjacency.clear();

        for (i, node) in self.graph.nodes.iter().enumerate() {
            self.node_index.insert(node.id.clone(), i);
            for chunk in &node.entity.source_chunks {
                self.chunk_entities.entry(chunk.clone()).or_default().push(i);
            }
        }
        for (e, link) in self.graph.links.iter().enumerate() {
            let key = (link.source.clone(), link.target.clone(), link.relation.relation.to_lowercase());
            self.edge_index.insert(key, e);
            if let Some(&s) = self.node_index.get(&link.source) {
                self.adjacency.entry(s).or_default().push(e);
            }
            if let Some(&t) = self.node_index.get(&link.target) {
                if link.source != link.target {
                    self.adjacency.entry(t).or_default().push(e);
                }
            }
        }
    }

    /// Nodes whose name occurs in the question; if none do, nodes whose name
    /// contains one of the question's terms. Longest names first.
    pub fn match_entities(&self, query: &str) -> Vec<usize> {
        let q = node_key(query);
        let mut hits: Vec<usize> = self
            .graph
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.id.chars().count() >= MIN_MATCH_CHARS && q.contains(n.id.as_str()))
            .map(|(i, _)| i)
            .collect();

        if hits.is_empty() {
            let terms: Vec<&str> = q
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| t.chars().count() >= MIN_MATCH_CHARS)
                .collect();
            hits = self
                .graph
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| terms.iter().any(|t| n.id.contains(t)))
                .map(|(i, _)| i)
                .collect();
        }

        hits.sort_by(|&a, &b| {
            let la = self.graph.nodes[a].id.chars().count();
            let lb = self.graph.nodes[b].id.chars().count();
            lb.cmp(&la).then(a.cmp(&b))
        });
        hits
    }

    /// Breadth-first expansion from `start`, returning `(node, depth)` pairs
    /// in visit order, `start` included at depth 0.
    pub fn neighbourhood(&self, start: usize, max_depth: usize) -> Vec<(usize, usize)> {
        let mut seen = HashSet::from([start]);
        let mut order = vec![(start, 0)];
        let mut queue = VecDeque::from([(start, 0usize)]);
        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for link in self.links_of(node) {
                for end in [&link.source, &link.target] {
                    if let Some(&next) = self.node_index.get(end) {
                        if seen.insert(next) {
                            order.push((next, depth + 1));
                            queue.push_back((next, depth + 1));
                        }
                    }
                }
            }
        }
        order
    }

    /// Chunks that mention entities named in the query, scored by how many
    /// matched entities they mention.
    pub fn chunk_hits(&self, query: &str) -> Vec<(ChunkId, f32)> {
        let matched = self.match_entities(query);
        if matched.is_empty() {
            return Vec::new();
        }
        let mut scores: HashMap<&str, f32> = HashMap::new();
        for &i in &matched {
            for chunk in &self.graph.nodes[i].entity.source_chunks {
                *scores.entry(chunk.as_str()).or_default() += 1.0;
            }
        }
        let top = matched.len() as f32;
        let mut hits: Vec<(ChunkId, f32)> = scores.into_iter().map(|(c, s)| (c.to_string(), s / top)).collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        hits
    }
}

impl GraphIndex for GraphIndexer {
    fn index_chunks(&mut self, chunks: &[ChunkRecord]) -> Result<()> {
        tracing::info!(chunks = chunks.len(), "extracting knowledge graph");
        let pb = ProgressBar::new(chunks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
                .map_err(|e| Error::InvalidInput(e.to_string()))?
                .progress_chars("#>-"),
        );
        for chunk in chunks {
            pb.set_message(chunk.chunk_id.clone());
            let extraction = self.extractor.extract(chunk).map_err(|e| {
                pb.abandon_with_message(format!("failed at {}", chunk.chunk_id));
                e
            })?;
            self.merge_extraction(&chunk.chunk_id, extraction);
            pb.inc(1);
        }
        pb.finish_with_message("graph extraction completed");
        self.rebuild_indices();
        tracing::info!(stats = %self.statistics(), "knowledge graph built");
        Ok(())
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.graph)?;
        fs::write(path, json)?;
        tracing::info!(path = %path.display(), "graph artifact written");
        Ok(())
    }

    fn load_from(&mut self, path: &Path) -> Result<()> {
        let raw = fs::read_to_string(path)?;
        let graph: NodeLinkGraph = serde_json::from_str(&raw).map_err(|e| Error::malformed(path, e))?;
        let ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        if ids.len() != graph.nodes.len() {
            return Err(Error::malformed(path, "duplicate node ids"));
        }
        if let Some(dangling) = graph.links.iter().find(|l| !ids.contains(l.source.as_str()) || !ids.contains(l.target.as_str())) {
            return Err(Error::malformed(
                path,
                format!("link {} -> {} references an unknown node", dangling.source, dangling.target),
            ));
        }
        self.graph = graph;
        self.rebuild_indices();
        tracing::info!(path = %path.display(), stats = %self.statistics(), "graph artifact loaded");
        Ok(())
    }

    fn statistics(&self) -> GraphStats {
        GraphStats { nodes: self.graph.nodes.len(), edges: self.graph.links.len(), chunks: self.chunk_entities.len() }
    }
}

fn append_description(existing: &mut String, addition: &str) {
    let addition = addition.trim();
    if addition.is_empty() || existing.contains(addition) {
        return;
    }
    if !existing.is_empty() {
        existing.push_str("; ");
    }
    existing.push_str(addition);
}

fn push_unique(chunks: &mut Vec<ChunkId>, chunk_id: &ChunkId) {
    if !chunks.contains(chunk_id) {
        chunks.push(chunk_id.clone());
    }
}
