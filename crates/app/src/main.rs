mod auth;
mod error;
mod extract;
mod handlers;
mod server;
mod settings;
mod state;

use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_chat_core::IndexingStatus;
use settings::Settings;
use state::AppState;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version, about = "Chat with uploaded PDF documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
        bind: String,
    },
    /// Catalog every PDF under a folder and rebuild the index.
    Ingest {
        /// Folder that contains PDFs recursively.
        #[arg(long)]
        folder: PathBuf,
        /// Owner recorded on each catalog entry.
        #[arg(long)]
        owner: Option<String>,
    },
    /// Ask one question against the current index.
    Ask {
        #[arg(long)]
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let state = AppState::build(&cli.settings).await?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        profile = %state.profile,
        "pdf-chat boot"
    );

    match cli.command {
        Command::Serve { bind } => {
            server::serve(state, &bind, cli.settings.max_upload_bytes()).await?;
        }
        Command::Ingest { folder, owner } => {
            let report = state
                .ingestion
                .ingest_folder(&folder, owner.as_deref())
                .await?;

            println!(
                "{} files cataloged from {}",
                report.files.len(),
                folder.display()
            );
            match report.indexing {
                IndexingStatus::Indexed {
                    generation_id,
                    chunk_count,
                    skipped_documents,
                } => {
                    for skipped in &skipped_documents {
                        warn!(document = %skipped.name, reason = %skipped.reason, "skipped pdf");
                    }
                    println!(
                        "index generation {generation_id}: {chunk_count} chunks, {} files skipped",
                        skipped_documents.len()
                    );
                }
                IndexingStatus::Skipped { reason } => println!("index not rebuilt: {reason}"),
                IndexingStatus::Failed { reason } => anyhow::bail!("indexing failed: {reason}"),
            }
        }
        Command::Ask { question } => {
            let answer = state.query.ask(&question, None).await?;
            println!("{}", answer.answer);
            for (rank, chunk) in answer.context.iter().enumerate() {
                info!(rank, score = chunk.score, chars = chunk.text.chars().count(), "context chunk");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
