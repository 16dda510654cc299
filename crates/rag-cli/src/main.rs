//! RAG CLI - Command-line interface for the retrieval and answer pipeline.

mod corpus;
mod splitter;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use rag_chat::{ChatPipeline, ChatRequest, ConversationalChain, QueryRouter, WebSearchPath};
use rag_core::{ChatModel, Embedder, EmbeddingProvider, HistoryStore, RagConfig, SessionId};
use rag_embed::HashEmbedder;
use rag_query::{RetrievalOrchestrator, TermOverlapEncoder};
use rag_remote::{OpenAiChatModel, OpenAiEmbedder, TavilySearch};
use rag_store::SqliteStore;

use crate::corpus::CorpusLoader;
use crate::splitter::RecursiveSplitter;

/// rag - Hybrid retrieval and conversational answering over your documents
#[derive(Parser)]
#[command(name = "rag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: platform config dir, then ./rag-chat.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index .md/.txt files for a tenant, replacing its previous passages
    Index {
        /// File or directory to index
        path: PathBuf,

        /// Tenant the passages belong to
        #[arg(short, long)]
        tenant: String,
    },

    /// Run hybrid retrieval and print the ranked passages
    Retrieve {
        /// Query text
        query: String,

        /// Tenant to search
        #[arg(short, long)]
        tenant: String,
    },

    /// Show which evidence path a question would take
    Classify {
        /// Question text
        question: String,
    },

    /// Ask a question within a conversation
    Ask {
        /// Question text
        question: String,

        /// Session as userId#conversationId
        #[arg(short, long)]
        session: SessionId,

        /// Tenant to search (defaults to the session's user)
        #[arg(short, long)]
        tenant: Option<String>,
    },

    /// Print the history of a conversation
    History {
        /// Session as userId#conversationId
        #[arg(short, long)]
        session: SessionId,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(path: Option<&Path>, database: Option<PathBuf>) -> rag_core::Result<RagConfig> {
    let mut config = match path {
        Some(path) => RagConfig::load(path)?,
        None => RagConfig::load_default()?,
    };
    if let Some(database) = database {
        config.database.path = database;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.database)?;

    match cli.command {
        Commands::Index { path, tenant } => {
            index(&config, &path, &tenant).await?;
        }
        Commands::Retrieve { query, tenant } => {
            retrieve(&config, &query, &tenant).await?;
        }
        Commands::Classify { question } => {
            let router = QueryRouter::new(chat_model(&config)?);
            println!("{}", router.classify(&question).await);
        }
        Commands::Ask {
            question,
            session,
            tenant,
        } => {
            let mut request = ChatRequest::new(session, question);
            if let Some(tenant) = tenant {
                request = request.with_tenant(tenant);
            }
            ask(&config, &request).await?;
        }
        Commands::History { session } => {
            history(&config, &session).await?;
        }
    }

    Ok(())
}

fn open_store(config: &RagConfig) -> rag_core::Result<Arc<SqliteStore>> {
    let store = SqliteStore::from_config(&config.database)?.with_lexical_limit(config.lexical.limit);
    Ok(Arc::new(store))
}

fn embedder(config: &RagConfig) -> rag_core::Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.embedding.provider {
        EmbeddingProvider::Hash => {
            Arc::new(HashEmbedder::with_dimension(config.embedding.hash_dimension())?)
        }
        EmbeddingProvider::OpenAi => {
            Arc::new(OpenAiEmbedder::new(&config.completion, &config.embedding)?)
        }
    };
    Ok(embedder)
}

fn chat_model(config: &RagConfig) -> rag_core::Result<Arc<dyn ChatModel>> {
    Ok(Arc::new(OpenAiChatModel::new(&config.completion)?))
}

fn orchestrator(
    config: &RagConfig,
    model: Arc<dyn ChatModel>,
    store: Arc<SqliteStore>,
) -> rag_core::Result<RetrievalOrchestrator> {
    Ok(RetrievalOrchestrator::new(
        model,
        embedder(config)?,
        store.clone(),
        store,
        config.retrieval.clone(),
    )
    .with_reranker(Arc::new(TermOverlapEncoder)))
}

async fn index(
    config: &RagConfig,
    path: &Path,
    tenant: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = corpus::collect_files(path)?;

    if files.is_empty() {
        println!("No .md or .txt files found at: {}", path.display());
        return Ok(());
    }

    let store = open_store(config)?;
    let embedder = embedder(config)?;
    let mut loader = CorpusLoader::new(RecursiveSplitter::from_config(&config.chunking)?);

    let mut documents = Vec::new();
    for file in &files {
        match loader.load(file) {
            Ok(docs) => {
                println!("  {} - {} passages", file.display(), docs.len());
                documents.extend(docs);
            }
            Err(e) => eprintln!("  Error reading {}: {}", file.display(), e),
        }
    }

    let mut embeddings = Vec::with_capacity(documents.len());
    for doc in &documents {
        embeddings.push(embedder.embed(&doc.content).await?);
    }

    let count = store.replace_tenant(tenant, &documents, &embeddings)?;
    println!(
        "\nIndexed {} passages from {} file(s) for tenant '{}'",
        count,
        files.len(),
        tenant
    );

    Ok(())
}

async fn retrieve(
    config: &RagConfig,
    query: &str,
    tenant: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let orchestrator = orchestrator(config, chat_model(config)?, store)?;

    let report = orchestrator.retrieve_with_report(query, tenant).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

async fn ask(config: &RagConfig, request: &ChatRequest) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let model = chat_model(config)?;
    let retrieval = orchestrator(config, model.clone(), store.clone())?;

    let mut chain = ConversationalChain::new(model.clone(), store, Arc::new(retrieval));
    match TavilySearch::new(&config.search) {
        Ok(search) => {
            chain = chain.with_web_search(WebSearchPath::new(
                Arc::new(search),
                config.search.max_results,
            ));
        }
        Err(e) => warn!("Web search disabled: {}", e),
    }

    let pipeline = ChatPipeline::new(QueryRouter::new(model), chain);
    let response = pipeline.ask(request).await?;

    println!("[{}] {}", response.classification, response.preview());
    println!("{}", response.answer);

    Ok(())
}

async fn history(config: &RagConfig, session: &SessionId) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let turns = store.load_history(session).await?;

    if turns.is_empty() {
        println!("No history for session {}", session);
        return Ok(());
    }

    for turn in turns {
        println!("{}: {}", turn.role.as_str(), turn.content);
    }

    Ok(())
}
