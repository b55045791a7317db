use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use orca_coordinator::AgentCoordinator;
use orca_indexer::AdaptivePipeline;
use orca_metadata::AdaptiveMetadataManager;
use orca_protocol::{Query, QueryKind, RetrievalFilter};
use orca_retrieval::{
    AdaptiveRetriever, HeuristicEnricher, RetrievalConfig, RetrievalPipeline, SummaryWindow,
    VectorRetriever,
};
use orca_vector_store::{Embedder, HashingEmbedder, MemoryVectorStore};
use report::{MetadataReport, QueryReport, ResultEntry};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod report;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "orca")]
#[command(about = "Adaptive code retrieval for analysis agents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Retrieval config (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a directory and run a query through the retrieval pipeline
    Query(QueryArgs),

    /// Extract structural metadata from one file
    Metadata(MetadataArgs),
}

#[derive(Args)]
struct QueryArgs {
    /// Directory to index
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// code_search | semantic_search | dependency_search | context_search
    #[arg(long, default_value = "code_search", value_parser = parse_kind)]
    kind: QueryKind,

    #[arg(long, default_value_t = 10)]
    max_results: usize,

    /// Restrict results to a language (repeatable)
    #[arg(long)]
    language: Vec<String>,

    /// Agent the query is attributed to
    #[arg(long)]
    agent: Option<String>,

    /// Run the query this many times (later runs exercise the cache)
    #[arg(long, default_value_t = 1)]
    repeat: usize,

    /// Query text
    text: String,
}

#[derive(Args)]
struct MetadataArgs {
    /// Source file
    file: PathBuf,
}

fn parse_kind(raw: &str) -> std::result::Result<QueryKind, String> {
    QueryKind::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = QueryKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown query kind '{raw}' (expected one of: {})", known.join(", "))
    })
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Query(args) => run_query(args, &config).await,
        Commands::Metadata(args) => run_metadata(&args),
    }
}

fn load_config(path: Option<&Path>) -> Result<RetrievalConfig> {
    match path {
        Some(path) => RetrievalConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RetrievalConfig::default()),
    }
}

async fn run_query(args: QueryArgs, config: &RetrievalConfig) -> Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
    let store = Arc::new(MemoryVectorStore::new());
    let coordinator = Arc::new(AgentCoordinator::default());
    let agent = args.agent.as_deref();
    if let Some(agent) = agent {
        coordinator.register_agent(agent).await;
    }

    let mut indexer = AdaptivePipeline::new(embedder.clone(), store.clone(), &config.collection)
        .context("Failed to build indexing pipeline")?
        .with_coordinator(coordinator.clone());
    let index = indexer
        .index_directory(&args.root, agent)
        .await
        .with_context(|| format!("Failed to index {}", args.root.display()))?;
    for error in &index.errors {
        log::warn!("{error}");
    }

    let base = VectorRetriever::over_memory_store(embedder, store, &config.collection)
        .with_enricher(Arc::new(HeuristicEnricher));
    let retriever = Arc::new(
        AdaptiveRetriever::new(config, Arc::new(base)).with_coordinator(coordinator.clone()),
    );
    let mut pipeline = RetrievalPipeline::new(config, retriever.clone());

    let mut query = Query::new(&args.text)
        .kind(args.kind)
        .max_results(args.max_results);
    if !args.language.is_empty() {
        query = query.filters(RetrievalFilter::default().languages(args.language.iter()));
    }

    let runs = args.repeat.max(1);
    let mut last = None;
    for _ in 0..runs {
        let result = pipeline
            .retrieve(&query, agent)
            .await
            .context("Query failed")?;
        last = Some(result);
    }
    let result = last.context("Query produced no result")?;

    let report = QueryReport {
        query: args.text,
        runs,
        index,
        results: ResultEntry::from_result(&result),
        relevance: result.relevance(),
        error: result.error().map(str::to_string),
        performance: retriever.performance_summary(SummaryWindow::All),
        strategies: retriever.performance(),
        cache: retriever.cache_stats(),
        context: retriever.context_usage(),
        failures: pipeline.failure_stats(),
    };
    print_stdout(&serde_json::to_string_pretty(&report)?)
}

fn run_metadata(args: &MetadataArgs) -> Result<()> {
    let code = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let mut manager = AdaptiveMetadataManager::new().context("Failed to build extractor")?;
    let strategy = AdaptiveMetadataManager::select_strategy(&code);
    let metadata = manager
        .extract_metadata(&code, &args.file)
        .with_context(|| format!("Failed to extract metadata from {}", args.file.display()))?;

    let report = MetadataReport {
        path: args.file.display().to_string(),
        strategy: strategy.to_string(),
        metadata,
        strategies: manager.strategies().cloned().collect(),
    };
    print_stdout(&serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_kind_parses_snake_case() {
        assert_eq!(parse_kind("dependency_search"), Ok(QueryKind::DependencySearch));
        let err = parse_kind("grep").unwrap_err();
        assert!(err.contains("code_search"));
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "orca", "query", "--root", "src", "--language", "rust", "--language", "python",
            "--repeat", "2", "-v", "parse config",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Query(args) = cli.command else {
            panic!("expected query");
        };
        assert_eq!(args.language, vec!["rust", "python"]);
        assert_eq!(args.repeat, 2);
        assert_eq!(args.text, "parse config");
        assert_eq!(args.kind, QueryKind::CodeSearch);
    }
}
