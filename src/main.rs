//! # Offline Genie CLI (`genie`)
//!
//! The `genie` binary queues local documents, asks a RAG backend to index
//! them, and lets you chat with them. Optional generative helpers summarize
//! documents, rewrite questions, and pull key insights out of answers.
//!
//! ## Usage
//!
//! ```bash
//! genie --config ./config/genie.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `genie index <paths>...` | Upload and index files or directories |
//! | `genie ask <paths>... -q "<question>"` | Index, then ask one question |
//! | `genie chat [paths]...` | Interactive session |
//! | `genie completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Index a folder of reports
//! genie index ./reports
//!
//! # One-shot question with query rewriting and insights
//! genie ask ./reports -q "find refunds" --augment --insights
//!
//! # Interactive chat, verbose logging
//! RUST_LOG=offline_genie=debug genie chat ./reports
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use offline_genie::ask::{self, AskOptions};
use offline_genie::chat;
use offline_genie::config;
use offline_genie::ingest;
use offline_genie::progress::ProgressMode;

/// Offline Genie — chat with your documents through a RAG backend.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist the built-in defaults are used
/// (backend at `http://127.0.0.1:8000`, generative helpers disabled).
#[derive(Parser)]
#[command(
    name = "genie",
    about = "Offline Genie — chat with your documents through a RAG backend",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/genie.toml")]
    config: PathBuf,

    /// Indexing progress on stderr: auto (human when stderr is a TTY), human, json, or off.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    progress: ProgressMode,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Upload documents and build the backend index.
    ///
    /// Directories are walked and filtered with `[selection]` globs; files
    /// named directly are always included.
    Index {
        /// Files or directories to index.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Index documents, then ask a single question.
    Ask {
        /// Files or directories to index before asking.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// The question to ask.
        #[arg(short, long)]
        question: String,

        /// Rewrite the question with the generative provider before sending it.
        #[arg(long)]
        augment: bool,

        /// Extract key insights from the answer.
        #[arg(long)]
        insights: bool,

        /// Print the answer as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive chat session.
    Chat {
        /// Files or directories to queue at startup.
        paths: Vec<PathBuf>,
    },

    /// Print shell completions to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let load_config = || config::load_config(&cli.config);

    match cli.command {
        Commands::Index { paths } => {
            ingest::run_index(&load_config()?, &paths, cli.progress).await?;
        }
        Commands::Ask {
            paths,
            question,
            augment,
            insights,
            json,
        } => {
            let options = AskOptions {
                augment,
                insights,
                json,
            };
            ask::run_ask(&load_config()?, &paths, &question, options, cli.progress).await?;
        }
        Commands::Chat { paths } => {
            chat::run_chat(&load_config()?, &paths, cli.progress).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "genie", &mut std::io::stdout());
        }
    }

    Ok(())
}
