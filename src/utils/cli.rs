//! Running the CLI

// Allow exits because in this file we ideally handle all errors with known exit codes
#![allow(clippy::exit)]

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::pipeline::{self, Config, Outcome};
use crate::server;
use crate::story::{LogLevel, StoryRecord};
use crate::trigger::{self, DispatchInputs, IssuesEvent, RunOptions};

/// Chronicle ingests user stories into a markdown document kept in a
/// git repository and publishes each entry as a commit.
/// Run from inside the repository or pass the path to it.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the repository containing the story document. Defaults to cwd.
    #[arg(short, long, default_value_t = String::from("."))]
    repo_path: String,
    /// Chronicle cli subcommands
    #[command(subcommand)]
    subcommands: Subcommands,
}

///
#[derive(Clone, clap::Subcommand)]
enum Subcommands {
    /// Ingest a story supplied explicitly on the command line
    Dispatch {
        /// Raw story text. May contain arbitrary markdown.
        #[arg(long)]
        content: String,
        /// Log level: debug, info, warning, error or critical
        #[arg(long, default_value_t = String::from("error"))]
        log_level: String,
        /// Target story document, relative to the repository root
        #[arg(long)]
        file: Option<PathBuf>,
        /// Count of leading header lines never touched by inserts
        #[arg(long)]
        skip_lines: Option<usize>,
        /// Issue number the story refers to
        #[arg(long)]
        issue_number: u64,
        /// URL of the issue
        #[arg(long)]
        issue_url: String,
        /// Status label for the new entry
        #[arg(long)]
        status: String,
    },
    /// Ingest a story from a GitHub issues event payload
    IssueEvent {
        /// Path to the payload JSON. Defaults to $GITHUB_EVENT_PATH.
        #[arg(long)]
        event_path: Option<PathBuf>,
    },
    /// Serve the webhook listener
    Serve {
        /// Port on which to listen for issue events.
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
}

/// Initialize tracing from the resolved log level. `RUST_LOG`, when
/// set, wins over the level from the trigger.
fn init_tracing(log_level: LogLevel, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_filter()));
    if let Some(log_dir) = log_dir {
        let file_appender = tracing_appender::rolling::daily(log_dir, "chronicle.log");
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file_appender)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Main entrypoint to application
///
/// # Errors
/// Returns an error only from the listener; every other failure exits
/// with a nonzero status after logging.
pub fn run() -> std::io::Result<()> {
    let cli = Cli::parse();
    let repo_path_arg = Path::new(&cli.repo_path);
    let Ok(mut repo_path) = repo_path_arg.canonicalize() else {
        eprintln!(
            "error: repository path `{}` does not exist",
            &cli.repo_path
        );
        process::exit(1);
    };
    if cfg!(windows) {
        // Canonicalizing on Windows yields a `\\?\` UNC path git2 chokes on.
        let repo_path_str = repo_path.display().to_string();
        if repo_path_str.starts_with(r#"\\?"#) {
            repo_path = PathBuf::from(repo_path_str.replace(r#"\\?\"#, ""));
        }
    }
    let config = match Config::load(&repo_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:?}");
            process::exit(1);
        }
    };

    match cli.subcommands {
        Subcommands::Dispatch {
            content,
            log_level,
            file,
            skip_lines,
            issue_number,
            issue_url,
            status,
        } => {
            init_tracing(
                log_level.parse().unwrap_or(config.log_level),
                config.log_dir.as_deref(),
            );
            let inputs = DispatchInputs {
                content,
                log_level,
                file,
                skip_lines,
                issue_number,
                issue_url,
                status,
            };
            let (record, options) = match trigger::resolve_dispatch(&inputs, &config) {
                Ok(resolved) => resolved,
                Err(err) => {
                    tracing::error!("Invalid dispatch: {err:?}");
                    process::exit(1);
                }
            };
            run_pipeline(&repo_path, &config, &record, &options);
            Ok(())
        }
        Subcommands::IssueEvent { event_path } => {
            init_tracing(config.log_level, config.log_dir.as_deref());
            let event = match read_event(event_path) {
                Ok(event) => event,
                Err(err) => {
                    tracing::error!("Could not resolve trigger: {err:?}");
                    process::exit(1);
                }
            };
            let resolved = match trigger::resolve_issue_event(&event, &config) {
                Ok(resolved) => resolved,
                Err(err) => {
                    tracing::error!("Invalid issues event: {err:?}");
                    process::exit(1);
                }
            };
            let Some((record, options)) = resolved else {
                tracing::info!("Event does not open a labeled issue; nothing to do");
                return Ok(());
            };
            run_pipeline(&repo_path, &config, &record, &options);
            Ok(())
        }
        Subcommands::Serve { port } => {
            init_tracing(config.log_level, config.log_dir.as_deref());
            server::serve(repo_path, config, port)
        }
    }
}

/// Execute one ingestion run, exiting nonzero on any stage failure.
fn run_pipeline(repo_path: &Path, config: &Config, record: &StoryRecord, options: &RunOptions) {
    match pipeline::run(repo_path, config, record, options) {
        Ok(Outcome::Committed(commit)) => {
            tracing::info!("Story entry published as {commit}");
        }
        Ok(Outcome::NoChanges) => {
            tracing::info!("Story document unchanged; nothing to commit");
        }
        Err(err) => {
            tracing::error!("Ingestion failed: {err:?}");
            process::exit(1);
        }
    }
}

/// Read the issues event payload from the given path, falling back to
/// the `GITHUB_EVENT_PATH` convention of hosted runners.
fn read_event(event_path: Option<PathBuf>) -> anyhow::Result<IssuesEvent> {
    use anyhow::Context;
    let path = match event_path {
        Some(path) => path,
        None => PathBuf::from(
            std::env::var("GITHUB_EVENT_PATH")
                .context("no --event-path given and GITHUB_EVENT_PATH is not set")?,
        ),
    };
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("could not read event payload at {}", path.display()))?;
    let event =
        serde_json::from_str(&raw).context("could not parse the issues event payload")?;
    Ok(event)
}
