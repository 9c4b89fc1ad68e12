//! Job runner
//!
//! A dispatch table from job kind to handler. Each handler decodes its own
//! payload and is solely responsible for reporting its step's outcome.

mod code_check;
mod source_sync;

pub use code_check::CodeCheckHandler;
pub use source_sync::SourceSyncHandler;
pub use unit_test::UnitTestHandler;

use async_trait::async_trait;
use drill_core::domain::pipeline::{JobKind, JobPayload};
use drill_core::domain::progress::{ProgressMarker, ProgressPhase};
use drill_core::domain::status::StepStatus;
use drill_core::domain::task::Task;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

use crate::collaborators::{Linter, SourceSync};
use crate::context::WorkerContext;
use crate::error::StepError;

/// Everything a handler needs to know about the step it runs
pub struct StepContext<'a> {
    pub worker: &'a WorkerContext,
    pub task: &'a Task,
    pub step_name: &'a str,
}

impl StepContext<'_> {
    /// Reports this step's status with a log append
    pub async fn report(&self, status: StepStatus, logs_append: String) {
        self.worker
            .reporter
            .step_update(self.task.task_id, self.step_name, status, logs_append)
            .await
    }

    /// Reports a progress marker for this step
    pub async fn progress(&self, status: StepStatus, phase: ProgressPhase, message: String) {
        self.worker
            .reporter
            .progress(
                self.task.task_id,
                self.step_name,
                status,
                ProgressMarker::new(phase, message),
            )
            .await
    }

    pub fn checkout_dir(&self) -> Result<PathBuf, StepError> {
        self.worker.checkout_dir(self.task)
    }
}

/// Executes one kind of leaf job
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Runs the job described by the opaque `payload`
    async fn run(&self, step: &StepContext<'_>, payload: &serde_json::Value)
    -> Result<(), StepError>;
}

/// Dispatch table of job handlers
#[derive(Default)]
pub struct JobRunner {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl JobRunner {
    /// Creates an empty runner
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner with the three built-in job kinds
    pub fn standard(source_sync: Arc<dyn SourceSync>, linter: Arc<dyn Linter>) -> Self {
        Self::new()
            .with_handler(JobKind::SourceSync, SourceSyncHandler::new(source_sync))
            .with_handler(JobKind::UnitTest, UnitTestHandler)
            .with_handler(JobKind::CodeCheck, CodeCheckHandler::new(linter))
    }

    /// Registers (or replaces) the handler for `kind`
    pub fn with_handler(mut self, kind: JobKind, handler: impl JobHandler + 'static) -> Self {
        self.handlers.insert(kind, Arc::new(handler));
        self
    }

    /// Runs a leaf job through its handler
    pub async fn run(&self, step: &StepContext<'_>, job: &JobPayload) -> Result<(), StepError> {
        let Some(handler) = self.handlers.get(&job.kind) else {
            let err = StepError::config(format!(
                "no handler registered for job type '{}' (step '{}')",
                job.kind, step.step_name
            ));
            step.report(StepStatus::Failed, format!("{}\n", err)).await;
            return Err(err);
        };

        let result = handler.run(step, &job.payload).await;
        if let Err(e) = &result {
            error!(
                task_id = step.task.task_id,
                step = step.step_name,
                job = %job.kind,
                "Job failed: {}",
                e
            );
        }
        result
    }
}

/// Decodes a handler's payload, rejecting shapes the handler cannot use
pub(crate) fn decode_payload<T: DeserializeOwned>(
    job: &'static str,
    payload: &serde_json::Value,
) -> Result<T, StepError> {
    serde_json::from_value(payload.clone()).map_err(|source| StepError::Decode { job, source })
}
