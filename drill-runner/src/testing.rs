//! Shared test fixtures: sample tasks, temp dirs, recording and scripted fakes

use anyhow::anyhow;
use async_trait::async_trait;
use drill_core::domain::pipeline::PipelineDescription;
use drill_core::domain::progress::{ProgressMarker, ProgressPhase};
use drill_core::domain::status::{StepStatus, TaskStatus};
use drill_core::domain::task::{Task, TaskId};
use drill_core::dto::event::TaskEvent;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::collaborators::{Finding, LintOutput, Linter, SourceSync, SyncOutput};
use crate::config::Config;
use crate::context::WorkerContext;
use crate::error::StepError;
use crate::jobs::{JobHandler, JobRunner, StepContext};
use crate::repository::Reporter;

/// Creates a fresh, empty directory that is removed when dropped
pub fn temp_dir(prefix: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(&format!("drill-{}-", prefix))
        .tempdir()
        .unwrap()
}

pub fn sample_task(task_id: TaskId) -> Task {
    Task {
        task_id,
        app_name: "demo".to_string(),
        branch: "main".to_string(),
        git_url: "https://git.example.com/team/demo.git".to_string(),
        pipeline: PipelineDescription::default(),
    }
}

pub fn test_context(jobs: JobRunner, reporter: Arc<dyn Reporter>) -> Arc<WorkerContext> {
    test_context_with(Config::default(), jobs, reporter)
}

pub fn test_context_with(
    config: Config,
    jobs: JobRunner,
    reporter: Arc<dyn Reporter>,
) -> Arc<WorkerContext> {
    WorkerContext::new(config, reporter, jobs)
}

/// Polls `condition` until it holds, panicking after `timeout`
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) {
    let started = Instant::now();
    while !condition() {
        assert!(started.elapsed() < timeout, "condition not met within {:?}", timeout);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Serves one canned HTTP response per connection, in order
///
/// Returns the base URL to point a client at.
pub async fn serve_responses(responses: Vec<(&'static str, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for (status_line, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{}", addr)
}

/// Reporter that keeps every event in memory
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<TaskEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Phases of the progress markers reported for `step`
    pub fn step_markers(&self, step: &str) -> Vec<ProgressPhase> {
        self.step_updates(step)
            .into_iter()
            .filter_map(|(_, logs)| ProgressMarker::parse_line(&logs).map(|m| m.phase))
            .collect()
    }

    /// Statuses of the non-marker updates reported for `step`
    pub fn step_statuses(&self, step: &str) -> Vec<StepStatus> {
        self.step_updates(step)
            .into_iter()
            .filter(|(_, logs)| ProgressMarker::parse_line(logs).is_none())
            .map(|(status, _)| status)
            .collect()
    }

    pub fn task_statuses(&self, task_id: TaskId) -> Vec<TaskStatus> {
        self.task_updates(task_id)
            .into_iter()
            .map(|(status, _)| status)
            .collect()
    }

    /// Log appends of every task-level update, concatenated
    pub fn task_logs(&self, task_id: TaskId) -> String {
        self.task_updates(task_id)
            .into_iter()
            .map(|(_, logs)| logs)
            .collect()
    }

    /// Task updates and terminal step updates, in report order
    ///
    /// Progress markers and step `Running` appends are left out. Entries read
    /// `"task Running"` or `"<step> Success"`.
    pub fn milestones(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TaskEvent::Task { update, .. } => Some(format!("task {:?}", update.status)),
                TaskEvent::Step { update, .. }
                    if update.status != StepStatus::Running
                        && ProgressMarker::parse_line(&update.logs_append).is_none() =>
                {
                    Some(format!("{} {:?}", update.step_name, update.status))
                }
                TaskEvent::Step { .. } => None,
            })
            .collect()
    }

    fn step_updates(&self, step: &str) -> Vec<(StepStatus, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TaskEvent::Step { update, .. } if update.step_name == step => {
                    Some((update.status, update.logs_append))
                }
                _ => None,
            })
            .collect()
    }

    fn task_updates(&self, task_id: TaskId) -> Vec<(TaskStatus, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TaskEvent::Task { task_id: id, update } if id == task_id => {
                    Some((update.status, update.logs_append))
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Reporter for RecordingReporter {
    async fn report(&self, event: TaskEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Job handler that records the steps it runs and reports like a real one
///
/// Clones share their call log and counters.
#[derive(Clone, Default)]
pub struct CountingHandler {
    calls: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub fn failing_on(mut self, step: &str) -> Self {
        self.failing.insert(step.to_string());
        self
    }

    pub fn panicking_on(mut self, step: &str) -> Self {
        self.panicking.insert(step.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Step names in the order the handler was entered
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Highest number of steps observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobHandler for CountingHandler {
    async fn run(
        &self,
        step: &StepContext<'_>,
        _payload: &serde_json::Value,
    ) -> Result<(), StepError> {
        let name = step.step_name.to_string();
        self.calls.lock().unwrap().push(name.clone());

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.panicking.contains(&name) {
            panic!("handler exploded on {}", name);
        }

        if self.failing.contains(&name) {
            step.report(StepStatus::Failed, format!("{} failed\n", name))
                .await;
            Err(StepError::Command(format!("{} failed", name)))
        } else {
            step.report(StepStatus::Success, format!("{} ok\n", name))
                .await;
            Ok(())
        }
    }
}

/// Source sync with a fixed outcome
pub struct ScriptedSync {
    progress: String,
    error: Option<String>,
    calls: Mutex<Vec<(String, PathBuf, String)>>,
}

impl ScriptedSync {
    pub fn succeeding(progress: &str) -> Self {
        Self {
            progress: progress.to_string(),
            error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(progress: &str, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::succeeding(progress)
        }
    }

    /// `(remote url, local dir, token)` of every call
    pub fn calls(&self) -> Vec<(String, PathBuf, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceSync for ScriptedSync {
    async fn sync(&self, remote_url: &str, local_dir: &Path, token: &str) -> SyncOutput {
        self.calls.lock().unwrap().push((
            remote_url.to_string(),
            local_dir.to_path_buf(),
            token.to_string(),
        ));
        SyncOutput {
            progress: self.progress.clone(),
            result: match &self.error {
                Some(message) => Err(anyhow!(message.clone())),
                None => Ok(()),
            },
        }
    }
}

/// Linter with a fixed outcome
pub struct ScriptedLinter {
    findings: Vec<Finding>,
    error: Option<String>,
    targets: Mutex<Vec<PathBuf>>,
}

impl ScriptedLinter {
    pub fn clean(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            error: None,
            targets: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(findings: Vec<Finding>, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::clean(findings)
        }
    }

    pub fn targets(&self) -> Vec<PathBuf> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Linter for ScriptedLinter {
    async fn lint(&self, target: &Path) -> LintOutput {
        self.targets.lock().unwrap().push(target.to_path_buf());
        LintOutput {
            findings: self.findings.clone(),
            result: match &self.error {
                Some(message) => Err(anyhow!(message.clone())),
                None => Ok(()),
            },
        }
    }
}

mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_is_removed_on_drop() {
        let dir = temp_dir("fixture");
        let path = dir.path().to_path_buf();
        std::fs::write(path.join("inbox.sled"), b"data").unwrap();
        assert!(path.is_dir());

        drop(dir);
        assert!(!path.exists());
    }
}
