use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use graphrag_core::chunking::WindowChunker;
use graphrag_core::config::Settings;
use graphrag_core::traits::LanguageModel;
use graphrag_engine::{clear_artifacts, ConsoleInput, IndexLifecycle, IndexOrigin, InteractiveSession};
use graphrag_graph::{GraphIndexer, GraphRetriever, LlmExtractor};
use graphrag_hybrid::{AdaptiveGenerator, HybridRetriever, IntelligentRouter};
use graphrag_llm::{get_default_embedder, LlmService};
use graphrag_vector::VectorStore;

#[derive(Parser, Debug)]
#[command(name = "graphrag", about = "Ask questions over a text corpus with graph and vector retrieval")]
struct Args {
    /// Settings file used in place of ./graphrag.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// Delete both index artifacts and rebuild from the corpus
    #[arg(long)]
    rebuild: bool,
    /// Documents retrieved per question
    #[arg(long)]
    top_k: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    println!("🚀 GraphRAG question answering\n==============================");

    let mut settings = Settings::load_with(args.config.as_deref()).map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    if let Some(k) = args.top_k {
        settings.retrieval.top_k = k;
        settings.validate()?;
    }

    let service = match LlmService::new(&settings.llm) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("❌ {e}");
            eprintln!("💡 Set SILICONFLOW_API_KEY (or APP_LLM__API_KEY) to a real key and try again.");
            return Ok(());
        }
    };
    let llm: Arc<dyn LanguageModel> = Arc::new(service.clone());

    let paths = settings.paths.resolve(&std::env::current_dir()?);
    if args.rebuild {
        println!("🧹 Removing existing indices");
        clear_artifacts(&paths)?;
    }

    let chunker = WindowChunker::new(settings.chunking.clone())?;
    let graph = GraphIndexer::new(Box::new(LlmExtractor::new(llm.clone(), &settings.llm)));
    let vectors = VectorStore::new(&paths.vector, get_default_embedder(&service, &settings.llm.embedding_model));
    let indices = match IndexLifecycle::new(paths.clone(), chunker, graph, vectors).ensure_indices() {
        Ok(indices) => indices,
        Err(e) => {
            tracing::error!(error = %e, "failed to prepare indices");
            eprintln!("❌ {e}");
            return Ok(());
        }
    };
    match indices.origin {
        IndexOrigin::Built { chunks } => println!("✅ Indices built from {chunks} chunks"),
        IndexOrigin::Loaded => println!("✅ Loaded existing indices"),
    }
    println!("📊 Graph: {}", indices.graph_stats());

    let graph = Arc::new(indices.graph);
    let vectors = Arc::new(indices.vectors);
    let router = IntelligentRouter::new(
        llm.clone(),
        &settings.llm,
        Box::new(GraphRetriever::new(graph.clone(), settings.retrieval.max_graph_depth)),
        Box::new(HybridRetriever::new(vectors.clone(), graph)),
        Box::new(vectors),
    );
    let generator = AdaptiveGenerator::new(llm, &settings.llm);

    let session = InteractiveSession::new(ConsoleInput::spawn()?, io::stdout(), settings.retrieval.top_k);
    let summary = session.run(&router, &generator)?;
    tracing::debug!(?summary, "bye");
    Ok(())
}
