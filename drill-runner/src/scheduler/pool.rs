//! Worker pool
//!
//! A fixed number of workers share the receiving end of the hand-off channel.
//! Each worker runs one task at a time and never exits because a task
//! failed, including when a job handler panics.

use drill_core::domain::status::TaskStatus;
use drill_core::domain::task::Task;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

use crate::context::WorkerContext;
use crate::service::PipelineExecutor;

/// Starts `config.parallel_workers` workers reading from `tasks`
///
/// Workers stop once the sending side of `tasks` is dropped and drained.
pub fn spawn(ctx: Arc<WorkerContext>, tasks: mpsc::Receiver<Task>) -> Vec<JoinHandle<()>> {
    let size = ctx.config.parallel_workers.max(1);
    let tasks = Arc::new(Mutex::new(tasks));

    info!("Starting {} worker(s)", size);
    (0..size)
        .map(|worker_id| {
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&ctx),
                Arc::clone(&tasks),
            ))
        })
        .collect()
}

async fn worker_loop(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    tasks: Arc<Mutex<mpsc::Receiver<Task>>>,
) {
    loop {
        // Only the lock holder waits on the channel; the others queue on the lock
        let next = tasks.lock().await.recv().await;
        let Some(task) = next else {
            info!(worker_id, "Hand-off closed, worker stopping");
            return;
        };

        let task_id = task.task_id;
        let status = process_task(&ctx, task).await;
        info!(worker_id, task_id, %status, "Task finished");
    }
}

/// Runs one task end to end and reports its lifecycle
///
/// Reports `Running`, executes the pipeline in its own tokio task, then
/// reports the terminal status. A failure (or a panic inside a handler) is
/// reported as `Failed` with `task failed: <error>` as the log append.
pub async fn process_task(ctx: &Arc<WorkerContext>, task: Task) -> TaskStatus {
    let task_id = task.task_id;
    info!(
        task_id,
        app = %task.app_name,
        branch = %task.branch,
        "Starting task"
    );
    ctx.reporter
        .task_update(task_id, TaskStatus::Running, String::new())
        .await;

    let executor = PipelineExecutor::new(Arc::clone(ctx));
    let outcome = tokio::spawn(async move { executor.run(&task).await }).await;

    let (status, logs) = match outcome {
        Ok(Ok(())) => (TaskStatus::Success, String::new()),
        Ok(Err(e)) => {
            error!(task_id, "Task failed: {}", e);
            (TaskStatus::Failed, format!("task failed: {}", e))
        }
        Err(e) => {
            let reason = abort_reason(e);
            error!(task_id, "Task execution aborted: {}", reason);
            (TaskStatus::Failed, format!("task failed: {}", reason))
        }
    };

    ctx.reporter.task_update(task_id, status, logs).await;
    status
}

fn abort_reason(e: JoinError) -> String {
    if !e.is_panic() {
        return "execution was cancelled".to_string();
    }

    let payload = e.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("job handler panicked: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::jobs::{JobRunner, UnitTestHandler};
    use crate::testing::{
        CountingHandler, RecordingReporter, ScriptedLinter, ScriptedSync, eventually, sample_task,
        temp_dir, test_context_with,
    };
    use drill_core::domain::pipeline::{JobKind, PipelineDescription, Step};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Config whose checkout root holds the sample task's checkout
    fn config_with_checkout(prefix: &str) -> (TempDir, Config) {
        let task = sample_task(0);
        let mut config = Config::default();
        let root = temp_dir(prefix);
        config.repo_storage_dir = root.path().to_path_buf();
        std::fs::create_dir_all(
            config
                .repo_storage_dir
                .join(&task.app_name)
                .join(&task.branch),
        )
        .unwrap();
        (root, config)
    }

    #[tokio::test]
    async fn test_sync_then_failing_tests_fails_task() {
        let (_root, mut config) = config_with_checkout("pool-scenario-a");
        config.unit_test_command = "echo running; exit 1".to_string();
        let reporter = Arc::new(RecordingReporter::default());
        let jobs = JobRunner::standard(
            Arc::new(ScriptedSync::succeeding("synced\n")),
            Arc::new(ScriptedLinter::clean(Vec::new())),
        );
        let ctx = test_context_with(config, jobs, reporter.clone());

        let mut task = sample_task(21);
        task.pipeline = PipelineDescription::sequential(vec![
            Step::job(
                "stepA",
                JobKind::SourceSync,
                json!({ "gitHttpUrl": "https://git.example.com/team/demo.git" }),
            ),
            Step::job("stepB", JobKind::UnitTest, json!({})),
        ]);

        let status = process_task(&ctx, task).await;

        assert_eq!(status, TaskStatus::Failed);
        assert_eq!(
            reporter.milestones(),
            vec!["task Running", "stepA Success", "stepB Failed", "task Failed"]
        );
        assert!(reporter.task_logs(21).starts_with("task failed: command failed"));
    }

    #[tokio::test]
    async fn test_parallel_success_reports_task_success_last() {
        let handler = CountingHandler::default();
        let reporter = Arc::new(RecordingReporter::default());
        let jobs = JobRunner::new().with_handler(JobKind::CodeCheck, handler.clone());
        let ctx = test_context_with(Config::default(), jobs, reporter.clone());

        let mut task = sample_task(22);
        task.pipeline = PipelineDescription::parallel(vec![
            Step::job("stepX", JobKind::CodeCheck, json!({})),
            Step::job("stepY", JobKind::CodeCheck, json!({})),
        ]);

        let status = process_task(&ctx, task).await;

        assert_eq!(status, TaskStatus::Success);
        let milestones = reporter.milestones();
        assert_eq!(milestones.len(), 4);
        assert_eq!(milestones[0], "task Running");
        let mut steps = milestones[1..3].to_vec();
        steps.sort();
        assert_eq!(steps, vec!["stepX Success", "stepY Success"]);
        assert_eq!(milestones[3], "task Success");
    }

    #[tokio::test]
    async fn test_handler_panic_fails_only_that_task() {
        let handler = CountingHandler::default().panicking_on("explode");
        let reporter = Arc::new(RecordingReporter::default());
        let mut config = Config::default();
        config.parallel_workers = 1;
        let jobs = JobRunner::new().with_handler(JobKind::CodeCheck, handler.clone());
        let ctx = test_context_with(config, jobs, reporter.clone());

        let (tx, rx) = mpsc::channel(1);
        let workers = spawn(ctx, rx);

        let mut doomed = sample_task(31);
        doomed.pipeline = PipelineDescription::sequential(vec![Step::job(
            "explode",
            JobKind::CodeCheck,
            json!({}),
        )]);
        let mut healthy = sample_task(32);
        healthy.pipeline = PipelineDescription::sequential(vec![Step::job(
            "fine",
            JobKind::CodeCheck,
            json!({}),
        )]);

        tx.send(doomed).await.unwrap();
        tx.send(healthy).await.unwrap();

        eventually(Duration::from_secs(10), || reporter.task_statuses(32).len() == 2).await;

        assert_eq!(
            reporter.task_statuses(31),
            vec![TaskStatus::Running, TaskStatus::Failed]
        );
        assert!(reporter.task_logs(31).contains("panicked"));
        assert_eq!(
            reporter.task_statuses(32),
            vec![TaskStatus::Running, TaskStatus::Success]
        );

        drop(tx);
        for worker in workers {
            worker.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_worker_continues_after_timeout() {
        let (_root, mut config) = config_with_checkout("pool-timeout");
        config.parallel_workers = 1;
        config.unit_test_command = "sleep 30".to_string();
        config.unit_test_timeout = Duration::from_millis(300);
        let reporter = Arc::new(RecordingReporter::default());
        let jobs = JobRunner::new()
            .with_handler(JobKind::UnitTest, UnitTestHandler)
            .with_handler(JobKind::CodeCheck, CountingHandler::default());
        let ctx = test_context_with(config, jobs, reporter.clone());

        let (tx, rx) = mpsc::channel(1);
        let _workers = spawn(ctx, rx);

        let mut slow = sample_task(41);
        slow.pipeline = PipelineDescription::sequential(vec![Step::job(
            "tests",
            JobKind::UnitTest,
            json!({}),
        )]);
        let mut next = sample_task(42);
        next.pipeline = PipelineDescription::sequential(vec![Step::job(
            "lint",
            JobKind::CodeCheck,
            json!({}),
        )]);

        tx.send(slow).await.unwrap();
        tx.send(next).await.unwrap();

        eventually(Duration::from_secs(10), || reporter.task_statuses(42).len() == 2).await;

        assert_eq!(
            reporter.task_statuses(41),
            vec![TaskStatus::Running, TaskStatus::Failed]
        );
        assert!(reporter.task_logs(41).contains("timed out"));
        assert_eq!(
            reporter.task_statuses(42),
            vec![TaskStatus::Running, TaskStatus::Success]
        );
    }

    #[tokio::test]
    async fn test_tasks_run_concurrently_up_to_pool_size() {
        let handler = CountingHandler::default().with_delay(Duration::from_millis(150));
        let reporter = Arc::new(RecordingReporter::default());
        let mut config = Config::default();
        config.parallel_workers = 2;
        let jobs = JobRunner::new().with_handler(JobKind::CodeCheck, handler.clone());
        let ctx = test_context_with(config, jobs, reporter.clone());

        let (tx, rx) = mpsc::channel(1);
        let _workers = spawn(ctx, rx);

        for id in 1..=4 {
            let mut task = sample_task(id);
            task.pipeline = PipelineDescription::sequential(vec![Step::job(
                format!("lint-{}", id),
                JobKind::CodeCheck,
                json!({}),
            )]);
            tx.send(task).await.unwrap();
        }

        eventually(Duration::from_secs(10), || handler.completed() == 4).await;
        assert_eq!(handler.peak_concurrency(), 2);
    }
}
