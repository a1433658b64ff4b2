use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cmd;

#[derive(Parser)]
#[command(name = "walkspec")]
#[command(version, about = "Voice-driven editor for project descriptions and phase plans")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new walkspec project
    Init,
    /// Talk to walkspec, one utterance per line on stdin
    Chat,
    /// Run a single utterance and print the response
    Say {
        /// The utterance, as it would come from speech-to-text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Print a document
    Show {
        #[arg(value_enum)]
        document: DocumentKind,
    },
    /// List the phases of the phasing document
    Phases,
    /// List backups of a document, newest first
    Backups {
        /// Artifact name: description, phasing or spec
        name: String,
    },
    /// Show recently executed actions
    Journal {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DocumentKind {
    Description,
    Phasing,
    Spec,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default walkspec.toml
    Init {
        /// Overwrite an existing file without asking
        #[arg(long)]
        force: bool,
    },
}

/// `WALKSPEC_LOG` wins over `RUST_LOG`; `--verbose` only changes the default.
fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose {
        "walkspec=debug"
    } else {
        "walkspec=info"
    };
    std::env::var("WALKSPEC_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}

/// Log to stderr, or to `<log_dir>/walkspec.log` when a log dir is given so
/// output doesn't interleave with the chat prompt.
fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(verbose);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, "walkspec.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .without_time()
                        .with_writer(std::io::stderr),
                )
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    dotenvy::from_path(project_dir.join(".env")).ok();
    dotenvy::dotenv().ok();

    let log_dir = match cli.command {
        Commands::Chat => Some(project_dir.join(walkspec::init::WALKSPEC_DIR).join("logs")),
        _ => None,
    };
    let _log_guard = init_logging(cli.verbose, log_dir.as_deref())?;

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Chat => cmd::cmd_chat(&project_dir, cli.verbose).await?,
        Commands::Say { text } => cmd::cmd_say(&project_dir, cli.verbose, &text.join(" ")).await?,
        Commands::Show { document } => cmd::cmd_show(&project_dir, *document)?,
        Commands::Phases => cmd::cmd_phases(&project_dir)?,
        Commands::Backups { name } => cmd::cmd_backups(&project_dir, name)?,
        Commands::Journal { limit } => cmd::cmd_journal(&project_dir, *limit)?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
