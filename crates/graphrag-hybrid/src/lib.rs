use std::collections::HashMap;
use std::sync::Arc;

use graphrag_core::error::Result;
use graphrag_core::traits::Retriever;
use graphrag_core::types::{RetrievedDocument, SourceKind};
use graphrag_graph::GraphIndexer;
use graphrag_vector::VectorStore;

pub mod generation;
pub mod router;

pub use generation::AdaptiveGenerator;
pub use router::IntelligentRouter;

/// Dense hits from the vector store fused with graph keyword hits.
///
/// Graph hits are chunk ids of chunks that mention entities named in the
/// query; their text is resolved through the vector store's metadata, which is
/// why both artifacts must share chunk ids.
pub struct HybridRetriever {
    vectors: Arc<VectorStore>,
    graph: Arc<GraphIndexer>,
}

impl HybridRetriever {
    pub fn new(vectors: Arc<VectorStore>, graph: Arc<GraphIndexer>) -> Self {
        Self { vectors, graph }
    }

    fn keyword_hits(&self, query: &str, k: usize) -> Vec<RetrievedDocument> {
        self.graph
            .chunk_hits(query)
            .into_iter()
            .filter_map(|(chunk_id, score)| match self.vectors.get(&chunk_id) {
                Some(meta) => Some(RetrievedDocument {
                    chunk_id: Some(chunk_id),
                    title: meta.display_title.clone(),
                    content: meta.text.clone(),
                    score,
                    source: SourceKind::Keyword,
                }),
                None => {
                    tracing::warn!(%chunk_id, "graph references a chunk missing from the vector store");
                    None
                }
            })
            .take(k)
            .collect()
    }
}

impl Retriever for HybridRetriever {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        let dense_hits = self.vectors.retrieve(query, k)?;
        let keyword_hits = self.keyword_hits(query, k);
        tracing::debug!(dense = dense_hits.len(), keyword = keyword_hits.len(), "hybrid candidates");
        Ok(merge_best(dense_hits.into_iter().chain(keyword_hits), k))
    }
}

/// Merge unique ids, keeping the better score, best first.
pub fn merge_best(hits: impl IntoIterator<Item = RetrievedDocument>, k: usize) -> Vec<RetrievedDocument> {
    let mut by_id: HashMap<String, RetrievedDocument> = HashMap::new();
    for h in hits {
        by_id
            .entry(h.dedup_key().to_string())
            .and_modify(|old| {
                if h.score > old.score {
                    *old = h.clone();
                }
            })
            .or_insert(h);
    }
    let mut merged: Vec<RetrievedDocument> = by_id.into_values().collect();
    merged.sort_by(|a, b| {
        b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.dedup_key().cmp(b.dedup_key()))
    });
    merged.truncate(k);
    merged
}
