//! # Ruling RAG CLI (`rrag`)
//!
//! Question answering over a corpus of tax-ruling letters, grounded in
//! retrieved passages and generated by a local Ollama model.
//!
//! ## Usage
//!
//! ```bash
//! rrag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rrag index` | Reload the corpus snapshot and rebuild the index cache |
//! | `rrag search "<query>"` | Retrieval only: hits, references, context |
//! | `rrag ask "<question>"` | Full answer with references |
//! | `rrag history [--last]` | Print the question/answer history |
//! | `rrag health` | Check the generation backend |
//! | `rrag serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use ruling_rag::config::{self, Config};
use ruling_rag::logging;
use ruling_rag::models::{AskResponse, Reference};
use ruling_rag::rag::RagService;
use ruling_rag::server;

/// Retrieval-augmented question answering over tax-ruling letters.
#[derive(Parser)]
#[command(name = "rrag", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reload the corpus and rebuild the index cache.
    Index,

    /// Rank documents for a query without generating an answer.
    Search {
        query: String,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the corpus.
    Ask {
        question: String,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the question/answer history, oldest first.
    History {
        /// Only the most recent entry.
        #[arg(long)]
        last: bool,
    },

    /// Check that the generation backend is reachable.
    Health,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index => run_index(cfg)?,
        Commands::Search { query, json } => run_search(cfg, &query, json)?,
        Commands::Ask { question, json } => run_ask(cfg, &question, json).await?,
        Commands::History { last } => run_history(cfg, last)?,
        Commands::Health => run_health(cfg).await?,
        Commands::Serve => {
            let bind = cfg.server.bind.clone();
            let service = Arc::new(RagService::from_config(cfg)?);
            server::run_server(service, &bind).await?;
        }
    }

    Ok(())
}

fn run_index(cfg: Config) -> anyhow::Result<()> {
    let service = RagService::from_config(cfg)?;
    let corpus = service.reload()?;
    println!(
        "Indexed {} documents ({} features) -> {}",
        corpus.documents.len(),
        corpus.index.features(),
        service.config().index.cache_path.display()
    );
    Ok(())
}

fn run_search(cfg: Config, query: &str, json: bool) -> anyhow::Result<()> {
    let service = RagService::from_config(cfg)?;
    let result = service.search(query)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    if result.hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in result.hits.iter().enumerate() {
        println!("{}. [{:.4}] {}", i + 1, hit.score, hit.label);
        println!(
            "    segment: offset {} (score {:.4})",
            hit.segment_start, hit.segment_score
        );
        println!("    excerpt: \"{}\"", excerpt(&hit.segment, 160));
        println!();
    }
    println!("--- Context ---");
    println!("{}", result.context);
    Ok(())
}

async fn run_ask(cfg: Config, question: &str, json: bool) -> anyhow::Result<()> {
    anyhow::ensure!(!question.trim().is_empty(), "question must not be empty");

    let service = RagService::from_config(cfg)?;
    let response = service.ask(question).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_answer(&response);
    }
    Ok(())
}

fn print_answer(response: &AskResponse) {
    println!("{}", response.answer);
    println!();
    println!("domain: {}", response.domain);
    println!(
        "status: {}",
        serde_json::to_value(response.status)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default()
    );
    for reference in &response.references {
        println!("  {}", format_reference(reference));
    }
}

fn format_reference(reference: &Reference) -> String {
    let marker = if reference.is_primary { "*" } else { "-" };
    match &reference.id {
        Some(id) => format!("{} [{:.4}] {}: {}", marker, reference.score, id, reference.title),
        None => format!("{} [{:.4}] {}", marker, reference.score, reference.title),
    }
}

fn run_history(cfg: Config, last: bool) -> anyhow::Result<()> {
    let service = RagService::from_config(cfg)?;
    if last {
        let entry = service
            .last()
            .map(serde_json::to_value)
            .transpose()?
            .unwrap_or_else(|| serde_json::json!({}));
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&service.history())?);
    }
    Ok(())
}

async fn run_health(cfg: Config) -> anyhow::Result<()> {
    let service = RagService::from_config(cfg)?;
    let gateway = service.gateway();
    match gateway.backend_health().await {
        Ok(()) => {
            println!("backend: ok ({})", gateway.model_name());
            Ok(())
        }
        Err(e) => {
            println!("backend: unreachable ({})", e);
            Err(e.into())
        }
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &trimmed[..end]),
        None => trimmed.to_string(),
    }
}
