//! Progress markers
//!
//! A progress marker is a milestone embedded as one JSON line inside a step's
//! log text, so the coordinator can pick milestones out of free-form output.

use serde::{Deserialize, Serialize};

/// Milestone phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressPhase {
    Start,
    Success,
    Failed,
}

/// A structured milestone line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMarker {
    /// Always `true`; lets readers tell markers apart from ordinary JSON output
    pub is_progress_marker: bool,
    pub phase: ProgressPhase,
    #[serde(default)]
    pub message: String,
}

impl ProgressMarker {
    pub fn new(phase: ProgressPhase, message: impl Into<String>) -> Self {
        Self {
            is_progress_marker: true,
            phase,
            message: message.into(),
        }
    }

    /// Renders the marker as a single newline-terminated log line
    pub fn to_log_line(&self) -> String {
        // Serializing a struct of strings and enums cannot fail
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }

    /// Parses a log line back into a marker
    ///
    /// Returns `None` for lines that are not markers, including JSON objects
    /// that lack a `true` marker flag.
    pub fn parse_line(line: &str) -> Option<Self> {
        serde_json::from_str::<Self>(line.trim())
            .ok()
            .filter(|marker| marker.is_progress_marker)
    }
}
