use async_trait::async_trait;
use drill_core::domain::progress::ProgressPhase;
use drill_core::domain::status::StepStatus;
use std::sync::Arc;
use tracing::{info, warn};

use super::{JobHandler, StepContext};
use crate::collaborators::{Finding, Linter};
use crate::error::StepError;

/// Runs static analysis over the task's checkout
///
/// Findings are informational: a scan that finds problems, or even fails to
/// run, is reported through the step's status but never fails the pipeline.
/// Only an unusable checkout path is an error.
pub struct CodeCheckHandler {
    linter: Arc<dyn Linter>,
}

impl CodeCheckHandler {
    pub fn new(linter: Arc<dyn Linter>) -> Self {
        Self { linter }
    }
}

#[async_trait]
impl JobHandler for CodeCheckHandler {
    async fn run(
        &self,
        step: &StepContext<'_>,
        _payload: &serde_json::Value,
    ) -> Result<(), StepError> {
        let dir = match step.checkout_dir() {
            Ok(dir) => dir,
            Err(e) => {
                step.report(StepStatus::Failed, e.to_string()).await;
                return Err(e);
            }
        };

        let output = self.linter.lint(&dir).await;
        info!(
            task_id = step.task.task_id,
            step = step.step_name,
            findings = output.findings.len(),
            "Code check finished"
        );

        let logs: String = output.findings.iter().map(Finding::to_log_line).collect();
        step.report(StepStatus::Running, logs).await;

        match output.result {
            Ok(()) => {
                step.progress(StepStatus::Success, ProgressPhase::Success, String::new())
                    .await
            }
            Err(e) => {
                warn!(
                    task_id = step.task.task_id,
                    step = step.step_name,
                    "Code check scan failed: {:#}",
                    e
                );
                step.progress(StepStatus::Failed, ProgressPhase::Failed, format!("{:#}", e))
                    .await
            }
        }

        Ok(())
    }
}
