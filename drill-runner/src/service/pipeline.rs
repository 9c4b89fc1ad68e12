//! Pipeline executor
//!
//! Walks a task's step-tree. Sequential levels run in list order and stop at
//! the first failure; parallel levels run every step concurrently and wait
//! for all of them. Nested pipelines recurse without a depth limit.

use drill_core::domain::pipeline::{PipelineDescription, Step, StepBody};
use drill_core::domain::progress::{ProgressMarker, ProgressPhase};
use drill_core::domain::status::StepStatus;
use drill_core::domain::task::Task;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::WorkerContext;
use crate::error::StepError;
use crate::jobs::StepContext;

/// Executes pipeline descriptions against a worker context
pub struct PipelineExecutor {
    ctx: Arc<WorkerContext>,
}

impl PipelineExecutor {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }

    /// Runs the task's top-level pipeline
    pub async fn run(&self, task: &Task) -> Result<(), StepError> {
        self.execute(task, &task.pipeline).await
    }

    /// Runs one level of the tree
    ///
    /// In a parallel level a single failure is returned as-is; several are
    /// folded into [`StepError::Parallel`] in step order.
    pub fn execute<'a>(
        &'a self,
        task: &'a Task,
        pipeline: &'a PipelineDescription,
    ) -> BoxFuture<'a, Result<(), StepError>> {
        async move {
            if pipeline.parallel {
                let results =
                    join_all(pipeline.steps.iter().map(|step| self.run_step(task, step))).await;
                let errors = results.into_iter().filter_map(Result::err).collect();
                match StepError::aggregate(errors) {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            } else {
                for step in &pipeline.steps {
                    self.run_step(task, step).await?;
                }
                Ok(())
            }
        }
        .boxed()
    }

    async fn run_step(&self, task: &Task, step: &Step) -> Result<(), StepError> {
        let reporter = &self.ctx.reporter;

        let body = match step.body() {
            Ok(body) => body,
            Err(e) => {
                warn!(task_id = task.task_id, step = %step.name, "{}", e);
                reporter
                    .step_update(task.task_id, &step.name, StepStatus::Failed, e.to_string())
                    .await;
                return Err(StepError::config(e.to_string()));
            }
        };

        debug!(task_id = task.task_id, step = %step.name, "Starting step");
        reporter
            .progress(
                task.task_id,
                &step.name,
                StepStatus::Running,
                ProgressMarker::new(ProgressPhase::Start, ""),
            )
            .await;

        match body {
            StepBody::Job(job) => {
                let step_ctx = StepContext {
                    worker: &self.ctx,
                    task,
                    step_name: &step.name,
                };
                self.ctx.jobs.run(&step_ctx, job).await
            }
            StepBody::SubPipeline(pipeline) => {
                let result = self.execute(task, pipeline).await;
                let (status, logs) = match &result {
                    Ok(()) => (StepStatus::Success, String::new()),
                    Err(e) => (StepStatus::Failed, e.to_string()),
                };
                reporter
                    .step_update(task.task_id, &step.name, status, logs)
                    .await;
                result
            }
        }
    }
}
