//! concretebuddy CLI entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use concretebuddy::types::StreamEvent;
use concretebuddy::{Config, RagService};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "concretebuddy", version, about = "Question answering over concrete-materials standards")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the search index from a directory of markdown standards
    Index {
        /// Document directory (defaults to the configured data dir)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Ask a question and stream the answer
    Ask {
        /// The question
        query: String,

        /// Conversation id for follow-up questions
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Check provider reachability and index artifacts
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("concretebuddy=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Index { data_dir } => {
            let summary = RagService::build_index(&config, data_dir.as_deref()).await?;
            println!(
                "Indexed {} documents ({} skipped): {} chunks, {} parent sections",
                summary.documents, summary.skipped, summary.chunks, summary.parents
            );
        }

        Commands::Ask {
            query,
            conversation,
        } => {
            let service = RagService::connect(&config)?;
            let mut events = service.submit_query(query, conversation);

            let mut failed = false;
            while let Some(event) = events.recv().await {
                match event {
                    StreamEvent::Content { text, .. } => {
                        print!("{}", text);
                        std::io::stdout().flush()?;
                    }
                    StreamEvent::Error { message, .. } => {
                        eprintln!("error: {}", message);
                        failed = true;
                    }
                    StreamEvent::Done { conversation_id } => {
                        println!();
                        eprintln!("[conversation: {}]", conversation_id);
                    }
                }
            }

            if failed {
                std::process::exit(1);
            }
        }

        Commands::Health => {
            let report = RagService::health_check(&config).await;
            println!("ollama:           {}", status(report.ollama));
            println!("qdrant:           {}", status(report.qdrant));
            println!("lexical snapshot: {}", status(report.lexical_snapshot));
            println!("parent store:     {}", status(report.parent_store));

            if !report.healthy() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn status(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "unavailable"
    }
}
