//! Coordinator response shapes

use serde::{Deserialize, Serialize};

use crate::domain::task::Task;

/// Acknowledgement returned by the update endpoint
///
/// `code` is zero on success. The worker parses it but does not act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

impl Ack {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Response of the consume-task endpoint; `data` is empty when nothing is pending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeTaskResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<Task>,
}
