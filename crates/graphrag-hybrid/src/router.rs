//! Per-question strategy selection.
//!
//! The chat model is asked to classify the question; when the call fails or
//! the reply cannot be parsed, a keyword heuristic decides instead so routing
//! itself never fails a query.
use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use graphrag_core::config::LlmSettings;
use graphrag_core::error::Result;
use graphrag_core::traits::{LanguageModel, QueryRouter, Retriever};
use graphrag_core::types::{Prompt, RetrievedDocument, RouteAnalysis, Strategy};
use graphrag_llm::reply::parse_json_reply;

const GRAPH_CUES: &[&str] = &[
    "relationship", "related", "relation", "connect", "between", "why", "compare", "difference", "influence",
    "关系", "联系", "之间", "为什么", "影响", "比较", "区别", "相关",
];
const LOOKUP_CUES: &[&str] = &["what is", "who is", "define", "是什么", "是谁", "多少", "哪个", "哪些"];
const SHORT_QUESTION_CHARS: usize = 24;

const ROUTER_SYSTEM: &str = "You route questions for a retrieval system. Reply with a single JSON object and nothing else.";

#[derive(Deserialize)]
struct RouterVerdict {
    strategy: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reasoning: String,
}

pub struct IntelligentRouter {
    llm: Arc<dyn LanguageModel>,
    model: String,
    graph: Box<dyn Retriever>,
    hybrid: Box<dyn Retriever>,
    vector: Box<dyn Retriever>,
}

impl IntelligentRouter {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        settings: &LlmSettings,
        graph: Box<dyn Retriever>,
        hybrid: Box<dyn Retriever>,
        vector: Box<dyn Retriever>,
    ) -> Self {
        Self { llm, model: settings.chat_model.clone(), graph, hybrid, vector }
    }

    pub fn analyze(&self, question: &str) -> RouteAnalysis {
        match self.ask_model(question) {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(error = %e, "model routing failed, using rules");
                rule_based_analysis(question)
            }
        }
    }

    fn ask_model(&self, question: &str) -> Result<RouteAnalysis> {
        let user = format!(
            "Choose the retrieval strategy for the question below.\n\
             - \"graph\": multi-hop questions about relationships between entities\n\
             - \"vector\": short factual lookups answered by one passage\n\
             - \"hybrid\": specific questions that benefit from both keywords and semantics\n\
             - \"combined\": broad questions needing both entity context and passages\n\
             Return JSON: {{\"strategy\": \"graph|vector|hybrid|combined\", \"confidence\": 0.0-1.0, \"reasoning\": \"...\"}}\n\n\
             Question: {question}"
        );
        let prompt = Prompt { model: self.model.clone(), system: Some(ROUTER_SYSTEM.to_string()), user, temperature: 0.0, max_tokens: 256 };
        let verdict: RouterVerdict = parse_json_reply(&self.llm.complete(&prompt)?)?;
        let strategy = Strategy::parse_loose(&verdict.strategy).ok_or_else(|| {
            graphrag_core::Error::ExternalService(format!("unknown strategy {:?}", verdict.strategy))
        })?;
        Ok(RouteAnalysis::new(strategy, verdict.confidence, verdict.reasoning))
    }

    fn retrieve_with(&self, analysis: &mut RouteAnalysis, question: &str, top_k: usize) -> Result<Vec<RetrievedDocument>> {
        match analysis.recommended_strategy {
            Strategy::Vector => self.vector.retrieve(question, top_k),
            Strategy::Hybrid => self.hybrid.retrieve(question, top_k),
            Strategy::Graph => {
                let docs = self.graph.retrieve(question, top_k)?;
                if !docs.is_empty() {
                    return Ok(docs);
                }
                tracing::info!("graph retrieval empty, falling back to hybrid");
                analysis.reasoning.push_str(" (no matching entities in the graph; fell back to hybrid retrieval)");
                self.hybrid.retrieve(question, top_k)
            }
            Strategy::Combined => {
                let graph_docs = self.graph.retrieve(question, top_k)?;
                let hybrid_docs = self.hybrid.retrieve(question, top_k)?;
                Ok(round_robin(graph_docs, hybrid_docs, top_k))
            }
        }
    }
}

impl QueryRouter for IntelligentRouter {
    fn route_query(&self, question: &str, top_k: usize) -> Result<(Vec<RetrievedDocument>, RouteAnalysis)> {
        let mut analysis = self.analyze(question);
        tracing::info!(
            strategy = %analysis.recommended_strategy,
            confidence = analysis.confidence,
            "query routed"
        );
        let docs = self.retrieve_with(&mut analysis, question, top_k)?;
        Ok((docs, analysis))
    }
}

/// Keyword heuristic used when the model cannot be consulted.
pub fn rule_based_analysis(question: &str) -> RouteAnalysis {
    let q = question.to_lowercase();
    if let Some(cue) = GRAPH_CUES.iter().find(|c| q.contains(*c)) {
        return RouteAnalysis::new(
            Strategy::Graph,
            0.6,
            format!("Rule-based fallback: \"{cue}\" suggests a relationship question"),
        );
    }
    let short = q.chars().count() <= SHORT_QUESTION_CHARS;
    if let Some(cue) = LOOKUP_CUES.iter().find(|c| q.contains(*c)).filter(|_| short) {
        return RouteAnalysis::new(
            Strategy::Vector,
            0.55,
            format!("Rule-based fallback: short lookup (\"{cue}\")"),
        );
    }
    RouteAnalysis::new(Strategy::Hybrid, 0.5, "Rule-based fallback: no strong cue, using hybrid retrieval")
}

/// Alternates between the two lists, skipping duplicates, up to `k` items.
pub fn round_robin(first: Vec<RetrievedDocument>, second: Vec<RetrievedDocument>, k: usize) -> Vec<RetrievedDocument> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(k);
    let mut a = first.into_iter();
    let mut b = second.into_iter();
    loop {
        let (x, y) = (a.next(), b.next());
        if x.is_none() && y.is_none() {
            break;
        }
        for doc in [x, y].into_iter().flatten() {
            if out.len() < k && seen.insert(doc.dedup_key().to_string()) {
                out.push(doc);
            }
        }
        if out.len() >= k {
            break;
        }
    }
    out
}
