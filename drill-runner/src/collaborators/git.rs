use anyhow::{Context, anyhow};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use super::{SourceSync, SyncOutput};
use crate::service::credentials::CredentialScope;

/// Source sync backed by the `git` command line
///
/// Clones when the checkout has no `.git` directory yet, otherwise
/// fast-forwards it. The access token reaches git only through a
/// [`CredentialScope`] private to the one git process. Git runs to
/// completion however long the transfer takes.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    async fn run(
        &self,
        remote_url: &str,
        local_dir: &Path,
        token: &str,
        progress: &mut String,
    ) -> anyhow::Result<()> {
        let scope = CredentialScope::install(remote_url, token)?;
        let args = sync_args(remote_url, local_dir);

        if !local_dir.join(".git").is_dir() {
            if let Some(parent) = local_dir.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        debug!(dir = %local_dir.display(), "Running git {:?}", args);
        let mut command = Command::new("git");
        command.args(&args).stdin(Stdio::null());
        if let Some(scope) = &scope {
            command.envs(scope.env());
        }

        let output = command.output().await.context("Failed to run git")?;

        progress.push_str(&String::from_utf8_lossy(&output.stdout));
        progress.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(())
        } else {
            Err(anyhow!("git exited with {}", output.status))
        }
    }
}

#[async_trait]
impl SourceSync for GitCli {
    async fn sync(&self, remote_url: &str, local_dir: &Path, token: &str) -> SyncOutput {
        let mut progress = String::new();
        let result = self.run(remote_url, local_dir, token, &mut progress).await;
        if result.is_ok() {
            info!(dir = %local_dir.display(), "Source sync finished");
        }
        SyncOutput { progress, result }
    }
}

/// Arguments for the git invocation that brings `local_dir` up to date
fn sync_args(remote_url: &str, local_dir: &Path) -> Vec<OsString> {
    if local_dir.join(".git").is_dir() {
        vec![
            "-C".into(),
            local_dir.as_os_str().to_owned(),
            "pull".into(),
            "--ff-only".into(),
        ]
    } else {
        vec![
            "clone".into(),
            remote_url.into(),
            local_dir.as_os_str().to_owned(),
        ]
    }
}
