//! # Studyflow CLI (`studyflow`)
//!
//! Drives the generation pipeline against a study-aid backend from the
//! terminal.
//!
//! ## Usage
//!
//! ```bash
//! studyflow --config ./config/studyflow.toml --email me@example.com <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `studyflow upload <file>` | Upload a document and summarize it |
//! | `studyflow summaries` | List summaries, newest first |
//! | `studyflow generate <kind>` | Generate a quiz, flashcards, or a video |
//! | `studyflow run <file> <kind>` | Upload, summarize, and generate in one go |
//! | `studyflow status <summary-id>` | Probe the generation job of a summary once |
//!
//! ## Examples
//!
//! ```bash
//! # Summarize lecture notes in the formal style
//! studyflow upload notes.pdf --style formal
//!
//! # Ten flashcards from summary 42
//! studyflow generate flashcards --summary 42 --count 10
//!
//! # Whole pipeline, ending in a minecraft-themed video
//! studyflow run notes.pdf video --theme minecraft --progress human
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use studyflow::backend::HttpBackend;
use studyflow::commands;
use studyflow::config;
use studyflow::logging;
use studyflow::pipeline::PipelineSettings;
use studyflow::progress::ProgressMode;
use studyflow::session::Session;
use studyflow::studio::Studio;
use studyflow_core::models::{ArtifactKind, ArtifactOptions, SummaryId, SummaryStyle, VideoTheme};

/// Studyflow: turn study documents into summaries, quizzes, flashcards,
/// and videos.
#[derive(Parser)]
#[command(
    name = "studyflow",
    about = "Turn study documents into summaries, quizzes, flashcards, and videos",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/studyflow.toml")]
    config: PathBuf,

    /// Email of the user to act as. Overrides `[session].email`.
    #[arg(long, global = true)]
    email: Option<String>,

    /// Progress output on stderr: `human`, `json`, or `off`.
    ///
    /// Defaults to `human` when stderr is a terminal, `off` otherwise.
    #[arg(long, global = true)]
    progress: Option<ProgressMode>,

    /// Debug logging for this tool (ignored when RUST_LOG is set).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a document (pdf, txt, docx) and summarize it.
    Upload {
        file: PathBuf,

        /// Summary style: `genz` or `formal`.
        #[arg(long)]
        style: Option<SummaryStyle>,
    },

    /// List your summaries, newest first. `*` marks the selected one.
    Summaries,

    /// Generate an artifact from a summary.
    ///
    /// Without `--summary` the newest summary is used.
    Generate {
        /// `quiz`, `flashcards`, or `video`.
        kind: ArtifactKind,

        #[arg(long)]
        summary: Option<i64>,

        /// Video theme: `subway`, `slime`, or `minecraft`.
        #[arg(long)]
        theme: Option<VideoTheme>,

        /// Number of quiz questions or flashcards.
        #[arg(long)]
        count: Option<u32>,
    },

    /// Upload, summarize, and generate in one invocation.
    Run {
        file: PathBuf,

        kind: ArtifactKind,

        #[arg(long)]
        style: Option<SummaryStyle>,

        #[arg(long)]
        theme: Option<VideoTheme>,

        #[arg(long)]
        count: Option<u32>,
    },

    /// Show the generation job status of a summary.
    Status { summary: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let mut cfg = config::load_config(&cli.config)?;
    if let Commands::Upload {
        style: Some(style), ..
    }
    | Commands::Run {
        style: Some(style), ..
    } = &cli.command
    {
        cfg.summarize.style = *style;
    }

    let session = Session::resolve(&cfg, cli.email.as_deref())?;
    let backend = Arc::new(HttpBackend::new(&cfg.backend)?);
    let base_url = backend.base_url().to_string();
    let reporter = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();
    let studio = Studio::new(
        session,
        backend,
        PipelineSettings::from(&cfg),
        Arc::from(reporter),
    );

    let result = match cli.command {
        Commands::Upload { file, .. } => commands::run_upload(&studio, &file).await,
        Commands::Summaries => commands::run_summaries(&studio).await,
        Commands::Generate {
            kind,
            summary,
            theme,
            count,
        } => {
            let options = ArtifactOptions { theme, count };
            commands::run_generate(&studio, &base_url, kind, summary.map(SummaryId), options).await
        }
        Commands::Run {
            file,
            kind,
            theme,
            count,
            ..
        } => {
            let options = ArtifactOptions { theme, count };
            commands::run_all(&studio, &base_url, &file, kind, options).await
        }
        Commands::Status { summary } => {
            commands::run_status(&studio, &base_url, SummaryId(summary)).await
        }
    };

    studio.close();
    result
}
