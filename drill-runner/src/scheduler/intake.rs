//! Task intake
//!
//! Periodically asks the coordinator for pending tasks and appends them to
//! the inbox. Intake is the only writer of the inbox in a running worker;
//! the dispatcher drains it independently.

use anyhow::{Context, Result};
use drill_client::CoordinatorClient;
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::{debug, error, info};

use crate::repository::Inbox;

/// Upper bound on tasks taken from the coordinator in one cycle
const MAX_TASKS_PER_CYCLE: usize = 32;

/// Polls the coordinator and feeds the inbox
pub struct TaskIntake {
    client: CoordinatorClient,
    inbox: Arc<Inbox>,
    interval: Duration,
}

impl TaskIntake {
    pub fn new(client: CoordinatorClient, inbox: Arc<Inbox>, interval: Duration) -> Self {
        Self {
            client,
            inbox,
            interval,
        }
    }

    /// Starts the polling loop
    pub async fn run(self) {
        info!("Starting task intake (interval: {:?})", self.interval);

        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            debug!("Polling coordinator for tasks");
            match self.poll_once().await {
                Ok(queued) if queued > 0 => info!("Queued {} task(s) this cycle", queued),
                Ok(_) => {}
                Err(e) => error!("Error during intake cycle: {:#}", e),
            }
        }
    }

    /// Performs a single poll cycle
    ///
    /// Consumes tasks until the coordinator has none left (or the per-cycle
    /// cap is hit) and returns how many were queued.
    pub async fn poll_once(&self) -> Result<usize> {
        let mut queued = 0;

        while queued < MAX_TASKS_PER_CYCLE {
            let Some(task) = self
                .client
                .consume_task()
                .await
                .context("Failed to consume task")?
            else {
                break;
            };

            let record_id = self
                .inbox
                .push(&task)
                .with_context(|| format!("Failed to queue task {}", task.task_id))?;
            debug!(task_id = task.task_id, record_id, "Queued task from coordinator");
            queued += 1;
        }

        Ok(queued)
    }
}
