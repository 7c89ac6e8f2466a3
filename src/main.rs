//! # mailrag CLI
//!
//! ```bash
//! mailrag --config ./config/mailrag.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mailrag index` | Embed the knowledge directory, replacing the collection |
//! | `mailrag search "<query>"` | Show the closest stored sections |
//! | `mailrag ask "<question>"` | Print one grounded answer |
//! | `mailrag session` | List recent emails, draft and send replies |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use mailrag::chat::OpenAIChat;
use mailrag::config::{self, Config};
use mailrag::embedding::OpenAIEmbedder;
use mailrag::gmail::GmailMailbox;
use mailrag::responder::Responder;
use mailrag::session::{Outcome, Session};
use mailrag::traits::{Embedder, ReplyGenerator};
use mailrag::{ingest, search};

/// Draft knowledge-grounded replies to your latest emails.
#[derive(Parser)]
#[command(name = "mailrag", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mailrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the vector collection from the knowledge directory.
    ///
    /// The collection is replaced, not appended to. If any embedding call
    /// fails the previous collection is kept as it was.
    Index,

    /// Search the collection and print the closest sections.
    Search {
        query: String,

        /// Number of results (defaults to `chat.top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a single question from the knowledge base.
    Ask { question: String },

    /// Interactive session over the latest inbox messages.
    Session,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    // Service clients are built once here and shared for the process lifetime
    let embedder: Arc<dyn Embedder> =
        Arc::new(OpenAIEmbedder::new(&cfg.openai, &cfg.embedding)?);

    match cli.command {
        Commands::Index => {
            ingest::run_index(&cfg, embedder).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, embedder, &query, limit).await?;
        }
        Commands::Ask { question } => {
            let responder = build_responder(&cfg, embedder)?;
            let answer = responder.generate_reply(&question).await?;
            println!("{}", answer);
        }
        Commands::Session => {
            run_session(&cfg, embedder).await?;
        }
    }

    Ok(())
}

fn build_responder(cfg: &Config, embedder: Arc<dyn Embedder>) -> Result<Responder> {
    let chat = Arc::new(OpenAIChat::new(&cfg.openai, &cfg.chat)?);
    Ok(Responder::new(
        &cfg.store,
        embedder,
        chat,
        cfg.chat.top_k,
        cfg.company.clone(),
    ))
}

async fn run_session(cfg: &Config, embedder: Arc<dyn Embedder>) -> Result<()> {
    let mailbox = GmailMailbox::authenticate(&cfg.gmail)
        .await
        .context("Cannot start session")?;
    let responder = build_responder(cfg, embedder)?;

    let session = Session::new(&mailbox, &responder, cfg.gmail.max_results);
    let stdin = std::io::stdin();
    let outcome = session.run(stdin.lock(), std::io::stdout()).await?;

    if outcome == Outcome::NoMail {
        tracing::info!("inbox empty, nothing to answer");
    }
    Ok(())
}
