//! # docqa CLI
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa serve` | Start the HTTP service |
//! | `docqa ask "<question>" [--file <path>]...` | One-shot question, optionally grounded in the given files |
//!
//! ## Examples
//!
//! ```bash
//! # Start the service
//! docqa serve
//!
//! # Ungrounded one-shot question
//! docqa ask "What is retrieval-augmented generation?"
//!
//! # Grounded in a report
//! docqa ask "What is the summary?" --file report.pdf
//! ```

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use docqa::config;
use docqa::embedding::GeminiEmbedder;
use docqa::generate::{stream_events, GenerationEvent, GeminiGenerator};
use docqa::prompt::compose;
use docqa::retrieve::retrieve_context;
use docqa::session::{ingest_file, SessionState};

/// docqa — a document-grounded question answering service with streamed
/// answers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; built-in defaults apply when the file is absent. The backend API
/// credential comes from `GEMINI_API_KEY` or `[backend].api_key`.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "docqa — document-grounded question answering with streamed answers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service.
    ///
    /// Binds to the address in `[server].bind` and serves the upload,
    /// reset, and chat endpoints until the process is terminated.
    Serve,

    /// Ask a single question and stream the answer to stdout.
    ///
    /// With `--file`, the given documents are ingested into a fresh
    /// in-process knowledge base first and the answer is grounded in them.
    Ask {
        /// The question to ask.
        question: String,

        /// Document to ground the answer in (repeatable; PDF or DOCX).
        #[arg(long = "file")]
        files: Vec<PathBuf>,

        /// Skip retrieval even when files were ingested.
        #[arg(long)]
        no_rag: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            docqa::server::run_server(&cfg).await?;
        }
        Commands::Ask {
            question,
            files,
            no_rag,
        } => {
            run_ask(&cfg, &question, &files, no_rag).await?;
        }
    }

    Ok(())
}

/// One-shot pipeline: ingest the given files, retrieve, compose, stream.
async fn run_ask(
    cfg: &config::Config,
    question: &str,
    files: &[PathBuf],
    no_rag: bool,
) -> anyhow::Result<()> {
    let embedder = GeminiEmbedder::new(cfg)?;
    let generator = Arc::new(GeminiGenerator::new(cfg)?);
    let session = SessionState::new();

    for file in files {
        let message = ingest_file(&session, cfg, &embedder, file)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", file.display(), e))?;
        println!("{}", message);
    }

    let context = {
        let slot = session.slot().await;
        retrieve_context(
            slot.as_ref(),
            question,
            !no_rag,
            cfg.retrieval.k,
            &embedder,
        )
        .await
    };

    let prompt = compose(question, &[], &context);
    let mut rx = stream_events(generator, prompt);

    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        match event {
            GenerationEvent::Content(text) => {
                // Fragments arrive framing-escaped; restore newlines for
                // terminal display.
                write!(stdout, "{}", text.replace("\\n", "\n"))?;
                stdout.flush()?;
            }
            GenerationEvent::Error(msg) => {
                writeln!(stdout)?;
                anyhow::bail!("generation failed: {}", msg);
            }
        }
    }
    writeln!(stdout)?;

    Ok(())
}
