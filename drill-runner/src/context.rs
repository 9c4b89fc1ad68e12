//! Worker context
//!
//! The one engine object of a worker process. It is built once in `main`
//! and shared by `Arc` with every worker, executor and job handler:
//! - Configuration
//! - Reporter for status events
//! - Job runner (dispatch table of job handlers)

use drill_core::domain::task::Task;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::error::StepError;
use crate::jobs::JobRunner;
use crate::repository::Reporter;

/// Process-wide state shared by all workers
pub struct WorkerContext {
    pub config: Config,
    pub reporter: Arc<dyn Reporter>,
    pub jobs: JobRunner,
}

impl WorkerContext {
    pub fn new(config: Config, reporter: Arc<dyn Reporter>, jobs: JobRunner) -> Arc<Self> {
        Arc::new(Self {
            config,
            reporter,
            jobs,
        })
    }

    /// Checkout directory of a task: `<root>/<app name>/<branch>`
    ///
    /// Application and branch names must stay inside the checkout root, so
    /// empty, `.`, `..` and absolute components are rejected.
    pub fn checkout_dir(&self, task: &Task) -> Result<PathBuf, StepError> {
        checked_relative("application name", &task.app_name)?;
        checked_relative("branch", &task.branch)?;

        Ok(self
            .config
            .repo_storage_dir
            .join(&task.app_name)
            .join(&task.branch))
    }
}

fn checked_relative(what: &str, value: &str) -> Result<(), StepError> {
    let path = Path::new(value);
    let valid = !value.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

    if valid {
        Ok(())
    } else {
        Err(StepError::config(format!(
            "{} '{}' is not a valid checkout path component",
            what, value
        )))
    }
}
