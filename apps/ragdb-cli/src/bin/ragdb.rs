use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ragdb_chat::{ChatBackend, ChatSession};
use ragdb_core::config::{resolve_with_base, Config, Settings};
use ragdb_embed::build_embedder;
use ragdb_pipeline::{reset, PipelineOptions, ResetOutcome, RetrievalPipeline};

#[derive(Parser)]
#[command(name = "ragdb", about = "Index documents and chat with them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a documents directory into the index
    Ingest {
        /// Documents directory (defaults to data.documents_dir)
        dir: Option<PathBuf>,
        /// Glob matched against paths relative to DIR
        #[arg(long)]
        pattern: Option<String>,
    },
    /// Query the index
    Search {
        query: String,
        #[arg(short, default_value_t = 3)]
        k: usize,
    },
    /// Erase a directory (defaults to data.documents_dir) together with its index
    Reset { dir: Option<PathBuf> },
    /// Interactive chat over the indexed documents
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let settings = config.settings()?;
    let base = std::env::current_dir()?;

    match cli.command {
        Commands::Ingest { dir, pattern } => {
            let dir = dir.unwrap_or_else(|| resolve_with_base(&base, &settings.data.documents_dir));
            let pattern = pattern.unwrap_or_else(|| settings.data.glob_pattern.clone());
            let pipeline = build_pipeline(&settings, &base, true)?;
            info!(dir = %dir.display(), %pattern, "ingesting");
            let report = pipeline.ingest(&dir, &pattern).await?;
            println!("Ingested {} files, added {} chunks", report.files_ingested, report.chunks_added);
            for skipped in &report.skipped {
                println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
            }
        }
        Commands::Search { query, k } => {
            let pipeline = build_pipeline(&settings, &base, false)?;
            let hits = pipeline.search(&query, k).await?;
            if hits.is_empty() {
                println!("No results (is the index built?)");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!("{:>2}. [{:.4}] {} ({})", rank + 1, hit.score, preview(&hit.chunk.text), hit.chunk.source_path);
            }
        }
        Commands::Reset { dir } => {
            let dir = dir.unwrap_or_else(|| resolve_with_base(&base, &settings.data.documents_dir));
            match reset(&dir)? {
                ResetOutcome::Erased => println!("Erased {}", dir.display()),
                ResetOutcome::NotFound => println!("Nothing to erase at {}", dir.display()),
            }
        }
        Commands::Chat => {
            let pipeline = build_pipeline(&settings, &base, false)?;
            let backend = ChatBackend::from_settings(pipeline, &settings.chat)?;
            run_chat(&backend).await?;
        }
    }
    Ok(())
}

fn build_pipeline(settings: &Settings, base: &Path, show_progress: bool) -> anyhow::Result<RetrievalPipeline> {
    let embedder = build_embedder(&settings.embedding);
    let options = PipelineOptions::from_settings(settings, base).with_progress(show_progress);
    Ok(RetrievalPipeline::new(embedder, options)?)
}

async fn run_chat(backend: &ChatBackend) -> anyhow::Result<()> {
    let mut session = ChatSession::new();
    for message in session.history() {
        println!("Ada: {}", message.content);
    }
    println!("(model {}; /reset clears the conversation, /exit quits)", backend.model_id());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else { break };
        let query = line.trim();
        match query {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                session.reset();
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        print!("Ada: ");
        let turn = backend
            .converse(query, &mut session, |text| {
                print!("{text}");
                let _ = std::io::stdout().flush();
            })
            .await;
        println!();
        if let Err(e) = turn {
            eprintln!("Error: {e}");
        }
    }
    Ok(())
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 120 {
        format!("{}...", flat.chars().take(117).collect::<String>())
    } else {
        flat
    }
}
