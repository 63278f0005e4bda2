//! The story module contains the Story Record and related domain types.

pub mod document;

use std::fmt;
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};
use url::Url;

/// A single user story as extracted from a triggering event.
///
/// A record is constructed fresh per event and is never persisted as
/// structured data. Only its rendered textual form ends up in the story
/// document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryRecord {
    /// Number of the issue the story was reported in.
    pub issue_number: u64,
    /// URL of the issue.
    pub url: Url,
    /// Free-form status label for the entry, e.g. "In-Progress".
    pub status: String,
    /// Raw story text. May contain arbitrary markdown.
    pub content: String,
}

impl StoryRecord {
    /// Build a validated record from raw trigger fields.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the issue number is zero, the URL is
    /// malformed, or the status or content is empty. Validation failures
    /// are terminal for the run; no later stage executes.
    pub fn new(
        issue_number: u64,
        url: &str,
        status: &str,
        content: &str,
    ) -> anyhow::Result<Self> {
        if issue_number == 0 {
            anyhow::bail!("issue number must be greater than zero");
        }
        let url = Url::parse(url)
            .map_err(|err| anyhow::anyhow!("issue url `{url}` is not well-formed: {err}"))?;
        if status.trim().is_empty() {
            anyhow::bail!("status must not be empty");
        }
        if content.trim().is_empty() {
            anyhow::bail!("story content must not be empty");
        }
        Ok(Self {
            issue_number,
            url,
            status: status.into(),
            content: content.into(),
        })
    }
}

/// The five log severities accepted by the trigger surfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-line insert tracing.
    Debug,
    /// Normal progress messages.
    Info,
    /// Suspicious but non-fatal conditions, e.g. duplicate issue numbers.
    Warning,
    /// Failures only. The process-wide default.
    #[default]
    Error,
    /// Reserved for failures that require operator attention.
    Critical,
}

impl LogLevel {
    /// The canonical lowercase name, as used on the trigger surfaces.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// The tracing env-filter directive for this level.
    ///
    /// `warning` maps to tracing's `warn`. `critical` maps to `error`,
    /// the most severe filter tracing offers.
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            _ => anyhow::bail!(
                "unknown log level `{value}`, expected one of debug, info, warning, error, critical"
            ),
        }
    }
}
