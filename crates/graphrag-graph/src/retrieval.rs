use std::fmt::Write as _;
use std::sync::Arc;

use graphrag_core::error::Result;
use graphrag_core::traits::Retriever;
use graphrag_core::types::{RetrievedDocument, SourceKind};

use crate::indexer::GraphIndexer;

/// Answers from entity neighbourhoods rather than raw chunks.
///
/// Every entity named in the question seeds a breadth-first walk of at most
/// `max_depth` hops; each visited entity becomes one document describing the
/// entity and its direct relations. Scores decay with distance from the seed.
pub struct GraphRetriever {
    index: Arc<GraphIndexer>,
    max_depth: usize,
}

impl GraphRetriever {
    pub fn new(index: Arc<GraphIndexer>, max_depth: usize) -> Self {
        Self { index, max_depth }
    }

    fn render(&self, idx: usize) -> Option<(String, String)> {
        let node = self.index.node(idx)?;
        let e = &node.entity;
        let mut content = format!("Entity: {} ({})\n", node.display_name(), e.entity_type);
        if !e.description.is_empty() {
            let _ = writeln!(content, "Description: {}", e.description);
        }
        let mut first = true;
        for link in self.index.links_of(idx) {
            if first {
                content.push_str("Relations:\n");
                first = false;
            }
            let source = self.display_name(&link.source);
            let target = self.display_name(&link.target);
            let _ = write!(content, "- {source} -[{}]-> {target}", link.relation.relation);
            if !link.relation.description.is_empty() {
                let _ = write!(content, ": {}", link.relation.description);
            }
            content.push('\n');
        }
        Some((format!("Entity: {}", node.display_name()), content.trim_end().to_string()))
    }

    fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.index.node_by_name(id).map_or(id, |n| n.display_name())
    }
}

impl Retriever for GraphRetriever {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        let seeds = self.index.match_entities(query);
        tracing::debug!(seeds = seeds.len(), "graph retrieval seeds");

        let mut best: Vec<(usize, f32)> = Vec::new();
        for seed in seeds {
            for (node, depth) in self.index.neighbourhood(seed, self.max_depth) {
                let score = 1.0 / (1.0 + depth as f32);
                match best.iter_mut().find(|(n, _)| *n == node) {
                    Some(entry) => entry.1 = entry.1.max(score),
                    None => best.push((node, score)),
                }
            }
        }
        best.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        best.truncate(k);

        Ok(best
            .into_iter()
            .filter_map(|(node, score)| {
                let (title, content) = self.render(node)?;
                Some(RetrievedDocument { chunk_id: None, title, content, score, source: SourceKind::Graph })
            })
            .collect())
    }
}
