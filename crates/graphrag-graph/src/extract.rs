//! Entity/relation extraction, one chunk at a time.
use std::sync::Arc;

use serde::Deserialize;

use graphrag_core::config::LlmSettings;
use graphrag_core::error::Result;
use graphrag_core::traits::LanguageModel;
use graphrag_core::types::{ChunkRecord, Prompt};
use graphrag_llm::reply::parse_json_reply;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Extraction {
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default)]
    pub relations: Vec<ExtractedRelation>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(default, alias = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractedRelation {
    pub source: String,
    pub target: String,
    #[serde(default, alias = "type")]
    pub relation: String,
    #[serde(default)]
    pub description: String,
}

pub trait EntityExtractor {
    fn extract(&self, chunk: &ChunkRecord) -> Result<Extraction>;
}

const EXTRACT_SYSTEM: &str = "You extract a knowledge graph from text. Reply with a single JSON object and nothing else.";

/// Extraction backed by a chat model.
pub struct LlmExtractor {
    llm: Arc<dyn LanguageModel>,
    model: String,
    max_tokens: u32,
}

impl LlmExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>, settings: &LlmSettings) -> Self {
        Self { llm, model: settings.extract_model.clone(), max_tokens: settings.max_tokens }
    }

    fn prompt(&self, chunk: &ChunkRecord) -> Prompt {
        let user = format!(
            "Identify the important entities (people, places, dishes, ingredients, tools, \
             concepts, ...) and the relations between them in the text below.\n\
             Keep names in the language of the text.\n\
             Return JSON of the form:\n\
             {{\"entities\": [{{\"name\": \"...\", \"type\": \"...\", \"description\": \"...\"}}],\n  \
             \"relations\": [{{\"source\": \"...\", \"target\": \"...\", \"relation\": \"...\", \"description\": \"...\"}}]}}\n\n\
             Text:\n{}",
            chunk.text
        );
        Prompt {
            model: self.model.clone(),
            system: Some(EXTRACT_SYSTEM.to_string()),
            user,
            temperature: 0.0,
            max_tokens: self.max_tokens,
        }
    }
}

impl EntityExtractor for LlmExtractor {
    fn extract(&self, chunk: &ChunkRecord) -> Result<Extraction> {
        let raw = self.llm.complete(&self.prompt(chunk))?;
        let extraction: Extraction = parse_json_reply(&raw)?;
        tracing::debug!(
            chunk = %chunk.chunk_id,
            entities = extraction.entities.len(),
            relations = extraction.relations.len(),
            "chunk extracted"
        );
        Ok(extraction)
    }
}
