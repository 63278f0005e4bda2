//! The pipeline module holds the run configuration and wires the
//! appender and committer stages into a single linear run.

use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use anyhow::Context;
use git2::Oid;
use serde_derive::{Deserialize, Serialize};

use crate::appender;
use crate::committer::{AuthorIdentity, DocRepo};
use crate::story::{LogLevel, StoryRecord};
use crate::trigger::RunOptions;

/// Configuration for pipeline runs.
///
/// All defaults live here as one explicit struct passed into the
/// pipeline entry point; the code never reads ambient environment
/// configuration apart from the push token fallback.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Default target story document, relative to the repository root.
    pub target_file: PathBuf,
    /// Default count of leading header lines never touched by inserts.
    pub skip_lines: usize,
    /// Default log level.
    pub log_level: LogLevel,
    /// Status assigned to entries created from issue events.
    pub default_status: String,
    /// Issues must carry this label to trigger event-driven ingestion.
    pub label: String,
    /// Message used for every story commit.
    pub commit_message: String,
    /// Subpath whose changes are staged and committed.
    pub doc_subpath: String,
    /// Remote the commit is pushed to.
    pub remote: String,
    /// Branch the commit is pushed to.
    pub branch: String,
    /// Overwrite remote history when the branch has diverged.
    ///
    /// Destructive: a concurrent push to the same branch is silently
    /// discarded. Leave false to fail closed on divergence.
    pub force_push: bool,
    /// Commit author name.
    pub author_name: String,
    /// Commit author email.
    pub author_email: String,
    /// External story-formatting tool. When unset the built-in
    /// appender renders entries.
    pub appender_command: Option<String>,
    /// Push token. Falls back to the `CHRONICLE_TOKEN` environment
    /// variable, then to the default git credential helpers.
    pub token: Option<String>,
    /// When set, logs also go to a daily-rolling file in this directory.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_file: PathBuf::from("docs/user-stories/README.md"),
            skip_lines: 2,
            log_level: LogLevel::Error,
            default_status: "In-Progress".into(),
            label: "user-story".into(),
            commit_message: "Add user story".into(),
            doc_subpath: "docs".into(),
            remote: "origin".into(),
            branch: "main".into(),
            force_push: false,
            author_name: "chronicle".into(),
            author_email: "chronicle@localhost".into(),
            appender_command: None,
            token: None,
            log_dir: None,
        }
    }
}

impl Config {
    /// Read the configuration from `.chronicle/config.toml` under
    /// `repo_path`. A missing file means all defaults; missing keys
    /// fall back per-field.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file exists but cannot be read or
    /// parsed.
    pub fn load(repo_path: &Path) -> anyhow::Result<Self> {
        let config_path = repo_path.join(".chronicle/config.toml");
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let config_str = read_to_string(&config_path)
            .with_context(|| format!("could not read {}", config_path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("could not parse {}", config_path.display()))?;
        Ok(config)
    }

    /// The push token: explicit config first, then `CHRONICLE_TOKEN`.
    #[must_use]
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("CHRONICLE_TOKEN").ok())
    }
}

/// What a completed run did to the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// An entry was appended and published as this commit.
    Committed(Oid),
    /// The working tree matched the last commit; nothing was mutated.
    NoChanges,
}

/// Execute one ingestion run: append the entry, then commit and push if
/// the documentation subpath changed.
///
/// Stages run strictly in order and any failure aborts the run. There
/// is no retry: a failed push leaves the working tree mutated, and
/// re-running appends a second entry.
///
/// # Errors
///
/// Will return `Err` if the appender fails, or if committing or pushing
/// a detected change fails.
pub fn run(
    repo_path: &Path,
    config: &Config,
    record: &StoryRecord,
    options: &RunOptions,
) -> anyhow::Result<Outcome> {
    tracing::info!(
        issue = record.issue_number,
        "Ingesting story into {}",
        options.file.display()
    );
    let repo = DocRepo::open(repo_path)?;

    let target = repo_path.join(&options.file);
    let appender = appender::select(config, options.log_level);
    appender.append(&target, options.skip_lines, record)?;

    if !repo.is_changed(&config.doc_subpath)? {
        tracing::info!("No changes under `{}`; nothing to commit", config.doc_subpath);
        return Ok(Outcome::NoChanges);
    }

    let author = AuthorIdentity {
        name: config.author_name.clone(),
        email: config.author_email.clone(),
    };
    let commit = repo.commit_subpath(&config.doc_subpath, &config.commit_message, &author)?;
    repo.push(
        &config.remote,
        &config.branch,
        config.force_push,
        config.resolved_token().as_deref(),
    )?;
    tracing::info!(commit = %commit, "Published `{}` to `{}`", config.branch, config.remote);
    Ok(Outcome::Committed(commit))
}
