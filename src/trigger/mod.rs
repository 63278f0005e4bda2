//! The trigger module resolves a triggering event into a Story Record
//! plus the options for one pipeline run.
//!
//! Two event sources exist: the GitHub `issues` webhook payload, which
//! only proceeds for newly opened issues carrying the designated label,
//! and the manual dispatch form, where the invoker supplies every field
//! explicitly.

use std::path::PathBuf;

use serde_derive::Deserialize;

use crate::pipeline::Config;
use crate::story::{LogLevel, StoryRecord};

/// The GitHub `issues` event payload, restricted to the fields consumed
/// here. Unknown payload fields are ignored on deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuesEvent {
    /// The action that produced the event, e.g. "opened".
    pub action: String,
    /// The issue the event refers to.
    pub issue: Issue,
}

/// The issue embedded in an `issues` event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    /// Issue number.
    pub number: u64,
    /// Browser URL of the issue.
    pub html_url: String,
    /// Issue body text. Absent for issues opened without a description.
    pub body: Option<String>,
    /// Labels attached to the issue.
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// A label attached to an issue.
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    /// Label name.
    pub name: String,
}

/// Operational parameters accompanying a Story Record into a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Log level for the run.
    pub log_level: LogLevel,
    /// Target story document, relative to the repository root.
    pub file: PathBuf,
    /// Leading header lines the appender never touches.
    pub skip_lines: usize,
}

impl RunOptions {
    /// The process-wide defaults, as fixed by the configuration.
    fn defaults(config: &Config) -> Self {
        Self {
            log_level: config.log_level,
            file: config.target_file.clone(),
            skip_lines: config.skip_lines,
        }
    }
}

/// The manual dispatch form. All fields are supplied by the invoker;
/// `file` and `skip_lines` fall back to the configured defaults.
#[derive(Debug, Clone)]
pub struct DispatchInputs {
    /// Raw story text.
    pub content: String,
    /// One of the five severities, as a string from the form.
    pub log_level: String,
    /// Target story document override.
    pub file: Option<PathBuf>,
    /// Header line count override.
    pub skip_lines: Option<usize>,
    /// Issue number the story refers to.
    pub issue_number: u64,
    /// URL of the issue.
    pub issue_url: String,
    /// Status label for the new entry.
    pub status: String,
}

/// Resolve an `issues` event into a record and run options.
///
/// Returns `Ok(None)` when the event is not an issue being opened, or
/// when the issue does not carry the designated label. In both cases
/// the pipeline is never invoked.
///
/// # Errors
///
/// Will return `Err` if a labeled, opened issue has an empty body; a
/// downstream commit would then lack meaningful content.
pub fn resolve_issue_event(
    event: &IssuesEvent,
    config: &Config,
) -> anyhow::Result<Option<(StoryRecord, RunOptions)>> {
    if event.action != "opened" {
        tracing::debug!(action = %event.action, "Ignoring issues event");
        return Ok(None);
    }
    if !event
        .issue
        .labels
        .iter()
        .any(|label| label.name == config.label)
    {
        tracing::debug!(
            issue = event.issue.number,
            "Ignoring issue without the `{}` label",
            config.label
        );
        return Ok(None);
    }
    let body = event.issue.body.as_deref().unwrap_or_default();
    let record = StoryRecord::new(
        event.issue.number,
        &event.issue.html_url,
        &config.default_status,
        body,
    )?;
    Ok(Some((record, RunOptions::defaults(config))))
}

/// Resolve a manual dispatch into a record and run options.
///
/// # Errors
///
/// Will return `Err` if any required field is missing or malformed:
/// empty content or status, a zero issue number, a malformed URL, or an
/// unknown log level. Validation failures happen before any mutation.
pub fn resolve_dispatch(
    inputs: &DispatchInputs,
    config: &Config,
) -> anyhow::Result<(StoryRecord, RunOptions)> {
    let log_level: LogLevel = inputs.log_level.parse()?;
    let record = StoryRecord::new(
        inputs.issue_number,
        &inputs.issue_url,
        &inputs.status,
        &inputs.content,
    )?;
    let options = RunOptions {
        log_level,
        file: inputs
            .file
            .clone()
            .unwrap_or_else(|| config.target_file.clone()),
        skip_lines: inputs.skip_lines.unwrap_or(config.skip_lines),
    };
    Ok((record, options))
}
