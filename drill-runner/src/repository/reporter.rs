//! Status reporter
//!
//! Posts task and step events to the coordinator. Reporting is best-effort:
//! a lost event is logged and forgotten and never fails the task being
//! reported on.

use async_trait::async_trait;
use drill_client::CoordinatorClient;
use drill_core::domain::progress::ProgressMarker;
use drill_core::domain::status::{StepStatus, TaskStatus};
use drill_core::domain::task::TaskId;
use drill_core::dto::event::TaskEvent;
use std::time::Duration;
use tracing::{debug, warn};

/// Sink for task and step events
///
/// Implementations must not fail the caller: `report` has no error path.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Delivers one event
    async fn report(&self, event: TaskEvent);

    /// Reports a task-level status with an optional log append
    async fn task_update(&self, task_id: TaskId, status: TaskStatus, logs_append: String) {
        self.report(TaskEvent::task(task_id, status, logs_append))
            .await
    }

    /// Reports a step-level status with an optional log append
    async fn step_update(
        &self,
        task_id: TaskId,
        step_name: &str,
        status: StepStatus,
        logs_append: String,
    ) {
        self.report(TaskEvent::step(task_id, step_name, status, logs_append))
            .await
    }

    /// Reports a progress marker as a one-line step log append
    async fn progress(
        &self,
        task_id: TaskId,
        step_name: &str,
        status: StepStatus,
        marker: ProgressMarker,
    ) {
        self.report(TaskEvent::progress(task_id, step_name, status, &marker))
            .await
    }
}

/// How many times to try a status event, and how long to wait in between
///
/// The default is a single attempt: events are fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn fire_and_forget() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }

    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::fire_and_forget()
        }
    }

    /// Delay before the attempt following `attempt` (1-based), doubling each time
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fire_and_forget()
    }
}

/// Reporter that posts events to the coordinator over HTTP
pub struct HttpReporter {
    client: CoordinatorClient,
    retry: RetryPolicy,
}

impl HttpReporter {
    pub fn new(client: CoordinatorClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

#[async_trait]
impl Reporter for HttpReporter {
    async fn report(&self, event: TaskEvent) {
        let task_id = event.task_id();
        let envelope = match event.into_envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(task_id, "Failed to encode status event: {}", e);
                return;
            }
        };

        let mut attempt = 1;
        loop {
            match self.client.post_event(&envelope).await {
                Ok(ack) => {
                    if !ack.is_ok() {
                        debug!(
                            task_id,
                            code = ack.code,
                            "Coordinator acknowledged event with non-zero code: {}",
                            ack.msg
                        );
                    }
                    return;
                }
                Err(e) if attempt < self.retry.max_attempts && e.is_transient() => {
                    let delay = self.retry.delay_after(attempt);
                    debug!(
                        task_id,
                        "Status event failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        self.retry.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(task_id, "Failed to report status event: {}", e);
                    return;
                }
            }
        }
    }
}
