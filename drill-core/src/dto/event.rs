//! Status events posted by the worker

use serde::{Deserialize, Serialize};

use crate::domain::progress::ProgressMarker;
use crate::domain::status::{StepStatus, TaskStatus};
use crate::domain::task::TaskId;

/// Discriminator carried by the event envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    TaskUpdate,
    StepUpdate,
}

/// Task-level update body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub status: TaskStatus,
    #[serde(default)]
    pub logs_append: String,
}

/// Step-level update body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdate {
    pub step_name: String,
    pub status: StepStatus,
    #[serde(default)]
    pub logs_append: String,
}

/// Envelope posted to the coordinator's update endpoint
///
/// `data` is kept opaque here; its shape is selected by `event_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_type: EventType,
    pub task_id: TaskId,
    pub data: serde_json::Value,
}

/// Typed event before it is wrapped for the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Task { task_id: TaskId, update: TaskUpdate },
    Step { task_id: TaskId, update: StepUpdate },
}

impl TaskEvent {
    pub fn task(task_id: TaskId, status: TaskStatus, logs_append: impl Into<String>) -> Self {
        TaskEvent::Task {
            task_id,
            update: TaskUpdate {
                status,
                logs_append: logs_append.into(),
            },
        }
    }

    pub fn step(
        task_id: TaskId,
        step_name: impl Into<String>,
        status: StepStatus,
        logs_append: impl Into<String>,
    ) -> Self {
        TaskEvent::Step {
            task_id,
            update: StepUpdate {
                step_name: step_name.into(),
                status,
                logs_append: logs_append.into(),
            },
        }
    }

    /// A step update whose log append is a single progress marker line
    pub fn progress(
        task_id: TaskId,
        step_name: impl Into<String>,
        status: StepStatus,
        marker: &ProgressMarker,
    ) -> Self {
        Self::step(task_id, step_name, status, marker.to_log_line())
    }

    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::Task { task_id, .. } | TaskEvent::Step { task_id, .. } => *task_id,
        }
    }

    /// Wraps the event into the wire envelope
    pub fn into_envelope(self) -> Result<EventEnvelope, serde_json::Error> {
        match self {
            TaskEvent::Task { task_id, update } => Ok(EventEnvelope {
                event_type: EventType::TaskUpdate,
                task_id,
                data: serde_json::to_value(update)?,
            }),
            TaskEvent::Step { task_id, update } => Ok(EventEnvelope {
                event_type: EventType::StepUpdate,
                task_id,
                data: serde_json::to_value(update)?,
            }),
        }
    }
}
