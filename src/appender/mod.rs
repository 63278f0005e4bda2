//! The appender module is the seam between the pipeline and whichever
//! program renders and inserts story entries.
//!
//! The built-in [`DocumentAppender`] owns the entry format. Deployments
//! that keep the historical external formatting tool configure
//! [`CommandAppender`] instead; it speaks the stable command-line
//! contract and treats the tool as a black box.

use std::path::Path;
use std::process::Command;

use anyhow::Context;

use crate::pipeline::Config;
use crate::story::document::StoryDocument;
use crate::story::{LogLevel, StoryRecord};

/// One unconditional append of a story entry into the target file.
///
/// Implementations must treat every invocation as an append; callers get
/// no deduplication from this seam.
pub trait Appender {
    /// Insert an entry for `record` into `target` directly after its
    /// `skip_lines`-line header.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the target cannot be read or written, if the
    /// header region exceeds the file, or if an external tool fails.
    fn append(&self, target: &Path, skip_lines: usize, record: &StoryRecord)
        -> anyhow::Result<()>;
}

/// The built-in appender, backed by [`StoryDocument`].
#[derive(Debug, Default)]
pub struct DocumentAppender;

impl Appender for DocumentAppender {
    fn append(
        &self,
        target: &Path,
        skip_lines: usize,
        record: &StoryRecord,
    ) -> anyhow::Result<()> {
        let mut document = StoryDocument::open(target, skip_lines)?;
        if document.entry_numbers().contains(&record.issue_number) {
            tracing::warn!(
                issue = record.issue_number,
                "An entry for this issue already exists; appending another"
            );
        }
        document.insert_entry(record);
        document.write()
    }
}

/// Appender that shells out to an external story-formatting tool.
#[derive(Debug)]
pub struct CommandAppender {
    /// Program name or path of the external tool.
    program: String,
    /// Log level forwarded to the tool.
    log_level: LogLevel,
}

impl CommandAppender {
    /// Wrap the external tool at `program`.
    #[must_use]
    pub const fn new(program: String, log_level: LogLevel) -> Self {
        Self { program, log_level }
    }
}

impl Appender for CommandAppender {
    fn append(
        &self,
        target: &Path,
        skip_lines: usize,
        record: &StoryRecord,
    ) -> anyhow::Result<()> {
        tracing::debug!(program = %self.program, "Invoking external story appender");
        let output = Command::new(&self.program)
            .arg("--file")
            .arg(target)
            .arg("--skip-lines")
            .arg(skip_lines.to_string())
            .arg("--issue-number")
            .arg(record.issue_number.to_string())
            .arg("--url")
            .arg(record.url.as_str())
            .arg("--status")
            .arg(&record.status)
            .arg("--content")
            .arg(&record.content)
            .arg("--log-level")
            .arg(self.log_level.as_str())
            .output()
            .with_context(|| format!("could not run story appender `{}`", self.program))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "story appender `{}` exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

/// Pick the appender the configuration asks for.
#[must_use]
pub fn select(config: &Config, log_level: LogLevel) -> Box<dyn Appender> {
    if let Some(program) = &config.appender_command {
        Box::new(CommandAppender::new(program.clone(), log_level))
    } else {
        Box::new(DocumentAppender)
    }
}
