//! The document module reads and mutates the story document: a markdown
//! file whose first `skip_lines` lines are a header region that inserts
//! never touch.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;

use crate::story::StoryRecord;

/// A story document loaded into memory, split at the header boundary.
///
/// Entries are inserted immediately after the header, so the newest
/// entry always appears first.
#[derive(Debug)]
pub struct StoryDocument {
    /// Path the document was loaded from and is written back to.
    path: PathBuf,
    /// The inviolable header region.
    header: Vec<String>,
    /// Everything after the header.
    body: Vec<String>,
}

impl StoryDocument {
    /// Load the document at `path`, treating the first `skip_lines`
    /// lines as the header region.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be read, or if it has fewer
    /// lines than `skip_lines`.
    pub fn open(path: &Path, skip_lines: usize) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("could not read story document at {}", path.display()))?;
        let mut header: Vec<String> = raw.lines().map(ToOwned::to_owned).collect();
        if header.len() < skip_lines {
            anyhow::bail!(
                "story document at {} has {} lines, fewer than the {} header lines to skip",
                path.display(),
                header.len(),
                skip_lines
            );
        }
        let body = header.split_off(skip_lines);
        Ok(Self {
            path: path.to_path_buf(),
            header,
            body,
        })
    }

    /// Issue numbers of the entries already present, in document order.
    #[must_use]
    pub fn entry_numbers(&self) -> Vec<u64> {
        self.body
            .iter()
            .filter_map(|line| entry_number(line))
            .collect()
    }

    /// Insert a rendered entry for `record` directly after the header.
    ///
    /// Every call inserts; identical input inserted twice yields two
    /// entries. Deduplication is not this document's concern.
    pub fn insert_entry(&mut self, record: &StoryRecord) {
        let mut body = render_entry(record);
        tracing::debug!(
            issue = record.issue_number,
            lines = body.len(),
            "Inserting entry after {} header lines",
            self.header.len()
        );
        body.append(&mut self.body);
        self.body = body;
    }

    /// Write the document back to the path it was loaded from.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be written.
    pub fn write(&self) -> anyhow::Result<()> {
        let mut contents = self.header.join("\n");
        if !self.header.is_empty() && !self.body.is_empty() {
            contents.push('\n');
        }
        contents.push_str(&self.body.join("\n"));
        contents.push('\n');
        fs::write(&self.path, contents)
            .with_context(|| format!("could not write story document at {}", self.path.display()))
    }
}

/// Render the entry block for a record: a heading line referencing the
/// issue, a blank separator, the raw content, and a trailing blank line.
fn render_entry(record: &StoryRecord) -> Vec<String> {
    let date = Utc::now().format("%Y-%m-%d");
    let mut lines = vec![
        format!(
            "### [#{}]({}) - {} ({date})",
            record.issue_number, record.url, record.status
        ),
        String::new(),
    ];
    lines.extend(record.content.lines().map(ToOwned::to_owned));
    lines.push(String::new());
    lines
}

#[allow(clippy::expect_used)]
/// Parse the issue number out of an entry heading line, if it is one.
fn entry_number(line: &str) -> Option<u64> {
    lazy_static! {
        static ref ENTRY_HEADING: Regex =
            Regex::new(r"^### \[#(\d+)\]\(").expect("Failed to compile regex!?!");
    }
    ENTRY_HEADING
        .captures(line)
        .and_then(|captures| captures.get(1))
        .and_then(|number| number.as_str().parse().ok())
}
