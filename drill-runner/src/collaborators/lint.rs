use anyhow::{Context, anyhow};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{Finding, LintOutput, Linter};
use crate::service::supervisor::shell_quote;

/// Linter that runs a shell command inside the target directory
///
/// Diagnostics of the form `path:line[:column]: message` on either output
/// stream become findings. Exit codes 0 and 1 both mean the scan ran (1 is
/// the usual "problems found" status); anything else is a scan error.
/// The scan is never cut short.
#[derive(Debug, Clone)]
pub struct CommandLinter {
    command: String,
}

impl CommandLinter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn scan(&self, target: &Path, findings: &mut Vec<Finding>) -> anyhow::Result<()> {
        // A failed `cd` exits 1 in some shells, which would pass for "problems found"
        if !target.is_dir() {
            return Err(anyhow!("lint target {} is not a directory", target.display()));
        }

        let script = format!(
            "cd {} && {}",
            shell_quote(&target.to_string_lossy()),
            self.command
        );
        debug!(script = %script, "Running linter");

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&script)
            .stdin(Stdio::null());
        let output = command.output().await.context("Failed to run linter")?;

        for stream in [&output.stdout, &output.stderr] {
            findings.extend(
                String::from_utf8_lossy(stream)
                    .lines()
                    .filter_map(Finding::parse),
            );
        }

        match output.status.code() {
            Some(0) | Some(1) => Ok(()),
            _ => Err(anyhow!(
                "lint command failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )),
        }
    }
}

#[async_trait]
impl Linter for CommandLinter {
    async fn lint(&self, target: &Path) -> LintOutput {
        let mut findings = Vec::new();
        let result = self.scan(target, &mut findings).await;
        LintOutput { findings, result }
    }
}
