//! # docchat CLI
//!
//! Interactive retrieval-augmented chat over local documents, backed by a
//! local Ollama instance.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat chat [FILES...]` | Start an interactive chat session, optionally pre-ingesting files |
//! | `docchat ingest <FILES...>` | Chunk and cache documents without starting a chat |
//! | `docchat clear-cache` | Remove all cached chunk entries |
//!
//! ## Chat commands
//!
//! Inside a chat session, lines starting with `/` are commands:
//! `/ingest <file>`, `/docs`, `/clear-docs`, `/clear`, `/stats`,
//! `/export <path>`, `/rag on|off`, `/threshold <value>`,
//! `/model <name>`, `/embedding-model <name>`, `/help`, `/quit`.
//! Anything else is sent to the model as a question.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use docchat::cache::ChunkCache;
use docchat::config::{self, Config};
use docchat::embedding::OllamaEmbedder;
use docchat::inference::OllamaGenerator;
use docchat::ingest::{IngestOutcome, IngestReport};
use docchat::models::DocumentSource;
use docchat::session::Session;

/// docchat — retrieval-augmented chat over local documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `docchat.example.toml` for a full example. A missing config
/// file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "Chat with your documents using local Ollama models",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session.
    Chat {
        /// Documents to ingest before the first question.
        files: Vec<PathBuf>,

        /// Start with retrieval disabled (plain chat).
        #[arg(long)]
        no_rag: bool,
    },

    /// Chunk, cache, and index documents without starting a chat.
    ///
    /// Useful for warming the chunk cache ahead of a session.
    Ingest {
        /// Documents to process.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove all cached chunk entries.
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Chat { files, no_rag } => {
            let mut session = Session::new(&cfg)?;
            session.settings.rag_enabled = !no_rag;
            if !files.is_empty() {
                let sources = load_sources(&files)?;
                report_ingest(&session.ingest_batch(&sources).await);
            }
            run_repl(&mut session, &cfg).await?;
        }
        Commands::Ingest { files } => {
            let mut session = Session::new(&cfg)?;
            let sources = load_sources(&files)?;
            let reports = session.ingest_batch(&sources).await;
            report_ingest(&reports);
            if reports.iter().any(|r| r.result.is_err()) {
                std::process::exit(1);
            }
        }
        Commands::ClearCache => {
            let cache = ChunkCache::new(cfg.cache.dir.clone())?;
            let removed = cache.clear()?;
            println!("Removed {removed} cache entries.");
        }
    }

    Ok(())
}

fn load_sources(files: &[PathBuf]) -> Result<Vec<DocumentSource>> {
    files
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("document")
                .to_string();
            Ok(DocumentSource::UploadedHandle { name, bytes })
        })
        .collect()
}

fn report_ingest(reports: &[IngestReport]) {
    for report in reports {
        match &report.result {
            Ok(IngestOutcome::Ingested { chunks, cache_hit }) => {
                let how = if *cache_hit { "from cache" } else { "processed" };
                println!("  {} — {} chunks ({})", report.name, chunks, how);
            }
            Ok(IngestOutcome::AlreadyProcessed) => {
                println!("  {} — already ingested, skipped", report.name);
            }
            Err(e) => {
                println!("  {} — FAILED: {}", report.name, e);
            }
        }
    }
}

async fn run_repl(session: &mut Session, cfg: &Config) -> Result<()> {
    println!(
        "docchat — inference: {}, embedding: {}. Type /help for commands.",
        session.inference_model(),
        session.embedding_model()
    );

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            if !handle_command(session, cfg, command).await? {
                break;
            }
            continue;
        }

        match session.ask(line).await {
            Ok(outcome) => {
                if let Some(reasoning) = &outcome.reasoning {
                    println!("[reasoning]\n{reasoning}\n");
                }
                println!("{}", outcome.answer);
                if outcome.used_context {
                    println!(
                        "\n(answered from {} retrieved chunk(s))",
                        outcome.retrieved.len()
                    );
                }
            }
            Err(e) => {
                // A failed turn leaves the session intact; keep going.
                println!("error: {e}");
            }
        }
    }

    Ok(())
}

/// Execute one slash command. Returns `false` when the session should end.
async fn handle_command(session: &mut Session, cfg: &Config, command: &str) -> Result<bool> {
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "exit" => return Ok(false),
        "help" => print_help(),
        "ingest" => {
            if arg.is_empty() {
                println!("usage: /ingest <file> [file...]");
            } else {
                let paths: Vec<PathBuf> = arg.split_whitespace().map(PathBuf::from).collect();
                match load_sources(&paths) {
                    Ok(sources) => report_ingest(&session.ingest_batch(&sources).await),
                    Err(e) => println!("error: {e}"),
                }
            }
        }
        "docs" => {
            let mut names: Vec<&str> = session.index().processed_names().collect();
            names.sort_unstable();
            if names.is_empty() {
                println!("No documents ingested.");
            } else {
                println!("{} indexed chunk(s) from:", session.index().len());
                for doc in names {
                    println!("  {doc}");
                }
            }
        }
        "clear-docs" => {
            session.clear_documents();
            println!("Document index cleared.");
        }
        "clear" => {
            session.clear_history();
            println!("Conversation history cleared.");
        }
        "stats" => {
            let stats = session.stats();
            println!(
                "{} messages total, {} from you; {} indexed chunk(s) from {} document(s)",
                stats.total_messages,
                stats.user_messages,
                session.index().len(),
                session.index().processed_count()
            );
        }
        "export" => {
            let path = if arg.is_empty() { "chat_history.csv" } else { arg };
            match session.export_csv(Path::new(path)) {
                Ok(()) => println!("Exported to {path}."),
                Err(e) => println!("export failed: {e}"),
            }
        }
        "rag" => match arg {
            "on" => {
                session.settings.rag_enabled = true;
                println!("Retrieval enabled.");
            }
            "off" => {
                session.settings.rag_enabled = false;
                println!("Retrieval disabled.");
            }
            _ => println!(
                "retrieval is {}; usage: /rag on|off",
                if session.settings.rag_enabled { "on" } else { "off" }
            ),
        },
        "threshold" => match arg.parse::<f32>() {
            Ok(value) if (0.0..=1.0).contains(&value) => {
                session.settings.similarity_threshold = value;
                println!("Similarity threshold set to {value}.");
            }
            _ => println!(
                "threshold is {}; usage: /threshold <0.0..1.0>",
                session.settings.similarity_threshold
            ),
        },
        "model" => {
            if arg.is_empty() {
                println!("inference model: {}", session.inference_model());
            } else {
                session.set_generator(Box::new(OllamaGenerator::with_model(&cfg.inference, arg)));
                println!("Inference model set to {arg}.");
            }
        }
        "embedding-model" => {
            if arg.is_empty() {
                println!("embedding model: {}", session.embedding_model());
            } else {
                let stale = session
                    .set_embedding_model(Box::new(OllamaEmbedder::with_model(&cfg.embedding, arg)));
                println!("Embedding model set to {arg}.");
                if stale {
                    warn!("index holds vectors from the previous model");
                    println!(
                        "Warning: existing documents were embedded with the previous model; \
                         run /clear-docs and re-ingest them."
                    );
                }
            }
        }
        _ => println!("unknown command: /{name} (try /help)"),
    }

    Ok(true)
}

fn print_help() {
    println!(
        "\
/ingest <file>...       chunk, cache, and index documents
/docs                   list ingested documents
/clear-docs             drop the document index
/clear                  drop the conversation history
/stats                  message and document counts
/export [path]          write the conversation as CSV (default chat_history.csv)
/rag on|off             toggle retrieval
/threshold <value>      set the similarity threshold (0.0..1.0)
/model [name]           show or set the inference model
/embedding-model [name] show or set the embedding model
/quit                   leave"
    );
}
