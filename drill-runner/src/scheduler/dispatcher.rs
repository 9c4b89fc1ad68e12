//! Dispatcher
//!
//! Moves tasks from the inbox into the worker hand-off channel, one at a
//! time. A slot in the channel is reserved before the inbox is touched, so
//! no record is removed from disk until a worker is able to take it.

use drill_core::domain::task::Task;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::repository::Inbox;

/// Single producer feeding the worker pool
pub struct Dispatcher {
    inbox: Arc<Inbox>,
    handoff: mpsc::Sender<Task>,
    empty_backoff: Duration,
    error_backoff: Duration,
}

impl Dispatcher {
    pub fn new(inbox: Arc<Inbox>, handoff: mpsc::Sender<Task>, config: &Config) -> Self {
        Self {
            inbox,
            handoff,
            empty_backoff: config.empty_queue_backoff,
            error_backoff: config.queue_error_backoff,
        }
    }

    /// Runs until every worker has gone away
    pub async fn run(self) {
        info!(pending = self.inbox.len(), "Dispatcher started");

        loop {
            let Ok(permit) = self.handoff.reserve().await else {
                break;
            };
            let Some(task) = self.next_task().await else {
                break;
            };

            debug!(task_id = task.task_id, "Handing task to a worker");
            permit.send(task);
        }

        info!("Hand-off channel closed, dispatcher stopping");
    }

    /// Pulls the next decodable task, waiting out empty or failing reads
    ///
    /// Undecodable records are logged and dropped. Returns `None` only when
    /// the hand-off channel has closed in the meantime.
    async fn next_task(&self) -> Option<Task> {
        loop {
            match self.inbox.pull() {
                Ok(Some(record)) => match record.decode() {
                    Ok(task) => return Some(task),
                    Err(e) => error!(
                        record_id = record.id,
                        "Dropping undecodable inbox record: {}", e
                    ),
                },
                Ok(None) => {
                    if self.handoff.is_closed() {
                        return None;
                    }
                    tokio::time::sleep(self.empty_backoff).await;
                }
                Err(e) => {
                    error!(
                        "Inbox read failed, retrying in {:?}: {}",
                        self.error_backoff, e
                    );
                    tokio::time::sleep(self.error_backoff).await;
                }
            }
        }
    }
}
