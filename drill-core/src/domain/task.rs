//! Task domain types

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::PipelineDescription;

/// Identifier assigned to a task by the coordinator
pub type TaskId = u64;

/// One unit of work submitted by the coordinator
///
/// Created by the coordinator, queued in the worker's inbox and consumed
/// exactly once by a single worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: TaskId,
    pub app_name: String,
    pub branch: String,
    pub git_url: String,
    pub pipeline: PipelineDescription,
}
