use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use kbrag_core::agent::{AgentRagConfig, CompiledAgentConfig};
use kbrag_core::config::{resolve_with_base, Config};
use kbrag_core::storage::LocalStorage;
use kbrag_core::types::{DocumentType, MetadataFilter, RetrieveOptions};
use kbrag_hybrid::{KnowledgeTools, RetrievalEngine};

#[derive(Parser)]
#[command(name = "kbrag", version, about = "Knowledge-base retrieval for domain agents")]
struct Cli {
    /// Directory holding config.toml; relative KB and snapshot paths resolve against it
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Agent RAG configuration (TOML)
    #[arg(long, short)]
    agent: PathBuf,

    /// -v for debug, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest the agent's knowledge base and print the summary
    Ingest {
        #[arg(long)]
        json: bool,
    },
    /// Run a retrieval query
    Query {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        min_score: Option<f32>,
        /// Restrict to document types (repeatable)
        #[arg(long = "type")]
        doc_types: Vec<String>,
        #[arg(long)]
        topic: Vec<String>,
        #[arg(long)]
        vertical: Vec<String>,
        #[arg(long)]
        benchmarks_only: bool,
        /// Attach neighboring chunks to each result
        #[arg(long)]
        context: bool,
        #[arg(long)]
        json: bool,
    },
    /// Look up a benchmark value
    Benchmark {
        #[arg(long)]
        vertical: String,
        #[arg(long, default_value = "")]
        channel: String,
        #[arg(long)]
        kpi: String,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

fn build_engine(cli: &Cli) -> anyhow::Result<RetrievalEngine> {
    let config = Config::load_from(&cli.config_dir).context("loading config.toml")?;
    let mut settings = config.rag_settings()?;
    if let Some(dir) = settings.ingest.snapshot_dir.take() {
        settings.ingest.snapshot_dir = Some(resolve_with_base(&cli.config_dir, dir).to_string_lossy().to_string());
    }
    let agent_cfg = AgentRagConfig::from_toml_file(&cli.agent)
        .with_context(|| format!("loading agent config {}", cli.agent.display()))?;
    let agent = Arc::new(CompiledAgentConfig::new(agent_cfg)?);
    let storage = Arc::new(LocalStorage::new(cli.config_dir.clone()));
    Ok(RetrievalEngine::new(agent, settings, storage)?)
}

fn ingest_with_spinner(engine: &RetrievalEngine) -> anyhow::Result<kbrag_core::types::IngestionSummary> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Indexing {}", engine.agent().kb_path()));
    let summary = engine.initialize();
    pb.finish_and_clear();
    Ok(summary?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let engine = build_engine(&cli)?;
    let summary = ingest_with_spinner(&engine)?;
    info!(
        agent = engine.agent().agent_id(),
        source = ?summary.source,
        chunks = summary.chunks,
        warnings = summary.warnings.len(),
        "knowledge base ready"
    );

    match &cli.command {
        Command::Ingest { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Agent:       {}", engine.agent().agent_id());
                println!("Source:      {:?}", summary.source);
                println!("Documents:   {} seen, {} indexed, {} excluded, {} skipped",
                    summary.documents_seen, summary.documents_indexed, summary.documents_excluded, summary.documents_skipped);
                println!("Chunks:      {}", summary.chunks);
                println!("Fingerprint: {}", summary.fingerprint);
                for w in &summary.warnings {
                    println!("⚠️  {}: {}", w.path, w.reason);
                }
            }
        }
        Command::Query { query, top_k, min_score, doc_types, topic, vertical, benchmarks_only, context, json } => {
            let document_types = doc_types
                .iter()
                .map(|t| t.parse::<DocumentType>())
                .collect::<Result<Vec<_>, _>>()?;
            let filter = MetadataFilter {
                document_types,
                topics: topic.clone(),
                verticals: vertical.clone(),
                must_have_benchmarks: *benchmarks_only,
                ..Default::default()
            };
            let defaults = engine.default_options();
            let options = RetrieveOptions {
                top_k: top_k.unwrap_or(defaults.top_k),
                min_score: min_score.unwrap_or(defaults.min_score),
                filters: (!filter.is_empty()).then_some(filter),
                include_context: *context,
            };
            let results = engine.retrieve(query, &options)?;
            debug!(query = %query, top_k = options.top_k, results = results.len(), "query answered");
            if *json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No results.");
            } else {
                for (i, r) in results.iter().enumerate() {
                    println!(
                        "{}. [{:.3}] {} (semantic {:.3}, keyword {:.3}, boost {:.2})",
                        i + 1,
                        r.score,
                        r.chunk.citation(),
                        r.breakdown.semantic,
                        r.breakdown.keyword,
                        r.breakdown.metadata_boost
                    );
                    let text = r.context.as_deref().unwrap_or(&r.chunk.content);
                    println!("   {}\n", text.trim().replace('\n', "\n   "));
                }
            }
        }
        Command::Benchmark { vertical, channel, kpi, json } => {
            let tools = KnowledgeTools::new()?;
            debug!(vertical = %vertical, channel = %channel, kpi = %kpi, "benchmark lookup");
            match tools.get_benchmark(&engine, vertical, channel, kpi) {
                Some(answer) if *json => println!("{}", serde_json::to_string_pretty(&answer)?),
                Some(answer) => {
                    println!("{}: {} ({:?} confidence)", answer.kpi, answer.value, answer.confidence);
                    println!("Source: {}", answer.citation);
                    println!("> {}", answer.excerpt);
                }
                None => println!("No benchmark found for {kpi} in {vertical}."),
            }
        }
    }
    Ok(())
}
