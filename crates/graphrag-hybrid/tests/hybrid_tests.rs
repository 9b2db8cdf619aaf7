use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use graphrag_core::config::LlmSettings;
use graphrag_core::traits::{AnswerGenerator, GraphIndex, LanguageModel, QueryRouter, Retriever, VectorIndex};
use graphrag_core::types::{ChunkRecord, Prompt, RetrievedDocument, SourceKind, Strategy};
use graphrag_core::{Error, Result};
use graphrag_graph::extract::ExtractedEntity;
use graphrag_graph::{EntityExtractor, Extraction, GraphIndexer};
use graphrag_hybrid::generation::{AnswerStyle, NO_CONTEXT_ANSWER};
use graphrag_hybrid::router::{round_robin, rule_based_analysis};
use graphrag_hybrid::{merge_best, AdaptiveGenerator, HybridRetriever, IntelligentRouter};
use graphrag_llm::FakeEmbedder;
use graphrag_vector::VectorStore;

struct CannedModel {
    reply: std::result::Result<String, String>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<Prompt>>,
}

impl CannedModel {
    fn ok(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: Ok(reply.to_string()), calls: AtomicUsize::new(0), last_prompt: Mutex::new(None) })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { reply: Err("503".to_string()), calls: AtomicUsize::new(0), last_prompt: Mutex::new(None) })
    }
}

impl LanguageModel for CannedModel {
    fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());
        self.reply.clone().map_err(Error::ExternalService)
    }
}

/// Returns the same documents for every query and counts calls.
struct StaticRetriever {
    docs: Vec<RetrievedDocument>,
    calls: Arc<AtomicUsize>,
}

impl Retriever for StaticRetriever {
    fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.docs.iter().take(k).cloned().collect())
    }
}

fn doc(id: &str, score: f32, source: SourceKind) -> RetrievedDocument {
    RetrievedDocument { chunk_id: Some(id.to_string()), title: id.to_string(), content: format!("text of {id}"), score, source }
}

fn static_retriever(docs: Vec<RetrievedDocument>) -> (Box<dyn Retriever>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (Box::new(StaticRetriever { docs, calls: calls.clone() }), calls)
}

struct Routed {
    router: IntelligentRouter,
    graph_calls: Arc<AtomicUsize>,
    hybrid_calls: Arc<AtomicUsize>,
    vector_calls: Arc<AtomicUsize>,
}

fn router_with(model: Arc<CannedModel>, graph_docs: Vec<RetrievedDocument>) -> Routed {
    let (graph, graph_calls) = static_retriever(graph_docs);
    let (hybrid, hybrid_calls) =
        static_retriever(vec![doc("chunk_1", 0.9, SourceKind::Vector), doc("chunk_2", 0.4, SourceKind::Keyword)]);
    let (vector, vector_calls) = static_retriever(vec![doc("chunk_3", 0.8, SourceKind::Vector)]);
    let router = IntelligentRouter::new(model, &LlmSettings::default(), graph, hybrid, vector);
    Routed { router, graph_calls, hybrid_calls, vector_calls }
}

#[test]
fn merge_best_dedups_and_keeps_higher_score() {
    let merged = merge_best(
        vec![
            doc("chunk_0", 0.2, SourceKind::Vector),
            doc("chunk_1", 0.7, SourceKind::Vector),
            doc("chunk_0", 0.9, SourceKind::Keyword),
        ],
        5,
    );
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].chunk_id.as_deref(), Some("chunk_0"));
    assert_eq!(merged[0].source, SourceKind::Keyword);
    assert_eq!(merge_best(merged, 1).len(), 1);
}

struct OneEntity;

impl EntityExtractor for OneEntity {
    fn extract(&self, chunk: &ChunkRecord) -> Result<Extraction> {
        let entities = if chunk.text.contains("rock sugar") {
            vec![ExtractedEntity { name: "rock sugar".to_string(), entity_type: "ingredient".to_string(), description: String::new() }]
        } else {
            Vec::new()
        };
        Ok(Extraction { entities, relations: Vec::new() })
    }
}

#[test]
fn hybrid_resolves_graph_hits_through_vector_metadata() {
    let tmp = tempfile::tempdir().unwrap();
    let chunks: Vec<ChunkRecord> = ["steamed fish with ginger", "caramelise the rock sugar first", "mapo tofu"]
        .iter()
        .enumerate()
        .map(|(i, t)| ChunkRecord::new(i, *t))
        .collect();

    let mut graph = GraphIndexer::new(Box::new(OneEntity));
    graph.index_chunks(&chunks).unwrap();
    let mut vectors = VectorStore::new(tmp.path().join("v.json"), Box::new(FakeEmbedder::default()));
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let meta: Vec<_> = chunks.iter().map(ChunkRecord::metadata).collect();
    vectors.add_texts(&texts, &meta).unwrap();

    let hybrid = HybridRetriever::new(Arc::new(vectors), Arc::new(graph));
    let docs = hybrid.retrieve("when do I add rock sugar", 3).unwrap();

    let sugar = docs.iter().find(|d| d.chunk_id.as_deref() == Some("chunk_1")).expect("graph hit present");
    assert_eq!(sugar.content, "caramelise the rock sugar first");
    assert_eq!(sugar.score, 1.0, "keyword hit outranks its dense score");
    assert!(docs.len() <= 3);
}

#[test]
fn router_follows_model_verdict() {
    let model = CannedModel::ok(r#"{"strategy": "vector", "confidence": 0.83, "reasoning": "simple lookup"}"#);
    let routed = router_with(model, Vec::new());
    let (docs, analysis) = routed.router.route_query("What is mapo tofu?", 5).unwrap();

    assert_eq!(analysis.recommended_strategy, Strategy::Vector);
    assert!((analysis.confidence - 0.83).abs() < 1e-6);
    assert_eq!(analysis.reasoning, "simple lookup");
    assert_eq!(docs[0].chunk_id.as_deref(), Some("chunk_3"));
    assert_eq!(routed.vector_calls.load(Ordering::SeqCst), 1);
    assert_eq!(routed.hybrid_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn router_uses_rules_when_model_fails() {
    let model = CannedModel::failing();
    let routed = router_with(model.clone(), vec![doc("entity", 1.0, SourceKind::Graph)]);
    let (_, analysis) = routed.router.route_query("红烧肉和五花肉之间有什么关系", 5).unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(analysis.recommended_strategy, Strategy::Graph);
    assert!(analysis.reasoning.starts_with("Rule-based fallback"));
    assert_eq!(routed.graph_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_graph_result_falls_back_to_hybrid() {
    let model = CannedModel::ok(r#"{"strategy": "graph", "confidence": 0.9, "reasoning": "relational"}"#);
    let routed = router_with(model, Vec::new());
    let (docs, analysis) = routed.router.route_query("how are these related", 5).unwrap();

    assert_eq!(analysis.recommended_strategy, Strategy::Graph);
    assert!(analysis.reasoning.contains("fell back to hybrid"));
    assert_eq!(docs.len(), 2);
    assert_eq!(routed.hybrid_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn combined_interleaves_without_duplicates() {
    let model = CannedModel::ok(r#"{"strategy": "combined", "confidence": 0.7, "reasoning": "broad"}"#);
    let routed = router_with(
        model,
        vec![doc("entity:a", 1.0, SourceKind::Graph), doc("chunk_1", 0.5, SourceKind::Graph)],
    );
    let (docs, _) = routed.router.route_query("tell me everything", 5).unwrap();
    let ids: Vec<_> = docs.iter().map(|d| d.dedup_key().to_string()).collect();
    assert_eq!(ids, vec!["entity:a", "chunk_1", "chunk_2"]);
}

#[test]
fn round_robin_respects_k() {
    let a = vec![doc("a1", 1.0, SourceKind::Graph), doc("a2", 1.0, SourceKind::Graph)];
    let b = vec![doc("b1", 1.0, SourceKind::Vector), doc("b2", 1.0, SourceKind::Vector)];
    let ids: Vec<_> = round_robin(a, b, 3).into_iter().map(|d| d.title).collect();
    assert_eq!(ids, vec!["a1", "b1", "a2"]);
}

#[test]
fn unknown_model_strategy_uses_rules() {
    let model = CannedModel::ok(r#"{"strategy": "telepathy", "confidence": 0.99}"#);
    let routed = router_with(model, Vec::new());
    let analysis = routed.router.analyze("tell me about braising in general terms please");
    assert_eq!(analysis.recommended_strategy, Strategy::Hybrid);
}

#[test]
fn rule_based_cues() {
    assert_eq!(rule_based_analysis("Why does rock sugar matter?").recommended_strategy, Strategy::Graph);
    assert_eq!(rule_based_analysis("红烧肉是什么").recommended_strategy, Strategy::Vector);
    assert_eq!(rule_based_analysis("Tell me about dinner ideas with pork").recommended_strategy, Strategy::Hybrid);
}

#[test]
fn generator_skips_model_without_documents() {
    let model = CannedModel::ok("unused");
    let generator = AdaptiveGenerator::new(model.clone(), &LlmSettings::default());
    let answer = generator.generate_adaptive_answer("anything", &[]).unwrap();
    assert_eq!(answer, NO_CONTEXT_ANSWER);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn generator_adapts_instruction_and_uses_settings() {
    let model = CannedModel::ok("  1. Blanch the pork.\n2. Braise.  ");
    let settings = LlmSettings { temperature: 0.3, ..LlmSettings::default() };
    let generator = AdaptiveGenerator::new(model.clone(), &settings);
    let docs = vec![doc("chunk_0", 0.9, SourceKind::Vector)];
    let answer = generator.generate_adaptive_answer("红烧肉怎么做", &docs).unwrap();

    assert_eq!(answer, "1. Blanch the pork.\n2. Braise.");
    let prompt = model.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.user.contains("step-by-step"));
    assert!(prompt.user.contains("text of chunk_0"));
    assert_eq!(prompt.temperature, 0.3);
    assert_eq!(AnswerStyle::for_question("What is tofu?"), AnswerStyle::Concise);
}

#[test]
fn generator_rejects_blank_answers() {
    let model = CannedModel::ok("   ");
    let generator = AdaptiveGenerator::new(model, &LlmSettings::default());
    let err = generator.generate_adaptive_answer("q", &[doc("chunk_0", 1.0, SourceKind::Vector)]).unwrap_err();
    assert!(matches!(err, Error::ExternalService(_)));
}

