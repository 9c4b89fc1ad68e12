//! External collaborators
//!
//! Source synchronisation and static analysis are delegated to outside tools.
//! The job handlers only see these traits; `main` wires in the command-backed
//! defaults and tests substitute scripted fakes.

mod git;
mod lint;

pub use git::GitCli;
pub use lint::CommandLinter;

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;

/// Result of a source sync: the tool's progress text and whether it worked
///
/// Progress text is kept on failure too, so it can be shown next to the error.
#[derive(Debug)]
pub struct SyncOutput {
    pub progress: String,
    pub result: anyhow::Result<()>,
}

/// Clones or updates a repository checkout
#[async_trait]
pub trait SourceSync: Send + Sync {
    async fn sync(&self, remote_url: &str, local_dir: &Path, token: &str) -> SyncOutput;
}

/// Result of a lint scan: findings so far and whether the scan itself ran
#[derive(Debug)]
pub struct LintOutput {
    pub findings: Vec<Finding>,
    pub result: anyhow::Result<()>,
}

/// Runs static analysis over a source tree
#[async_trait]
pub trait Linter: Send + Sync {
    async fn lint(&self, target: &Path) -> LintOutput;
}

/// One static-analysis finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub message: String,
}

impl Finding {
    /// Parses a `path:line[:column]: message` diagnostic line
    pub fn parse(line: &str) -> Option<Self> {
        let (location, message) = line.trim_end().split_once(": ")?;
        let (head, last) = location.rsplit_once(':')?;
        let last: u32 = last.parse().ok()?;

        let (file, line, column) = match head.rsplit_once(':') {
            Some((file, line)) => match line.parse::<u32>() {
                Ok(line) => (file, line, Some(last)),
                Err(_) => (head, last, None),
            },
            None => (head, last, None),
        };

        if file.is_empty() || message.is_empty() {
            return None;
        }

        Some(Self {
            file: file.to_string(),
            line,
            column,
            message: message.to_string(),
        })
    }

    /// Single-line JSON form used in step logs
    pub fn to_log_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}
