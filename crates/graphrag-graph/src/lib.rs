//! Knowledge-graph index: LLM extraction, cumulative merge, node-link
//! persistence, and neighbourhood retrieval.
pub mod extract;
pub mod indexer;
pub mod model;
pub mod retrieval;

pub use extract::{EntityExtractor, Extraction, LlmExtractor};
pub use indexer::GraphIndexer;
pub use retrieval::GraphRetriever;
