//! Error taxonomy for pipeline execution
//!
//! Queue errors live next to the inbox; reporting errors never leave the
//! reporter. Everything that can fail a step is a [`StepError`].

use std::time::Duration;
use thiserror::Error;

/// Why a step (and therefore its enclosing pipeline) failed
#[derive(Debug, Error)]
pub enum StepError {
    /// Step shape or job configuration is invalid; no handler was invoked
    #[error("{0}")]
    Config(String),

    /// A job payload could not be decoded into the handler's type
    #[error("failed to decode {job} payload: {source}")]
    Decode {
        job: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The external command could not be started
    #[error("failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),

    /// The external command ended unsuccessfully
    #[error("command failed: {0}")]
    Command(String),

    /// The external command exceeded its time budget and was killed
    #[error("command timed out after {}s and was killed", .0.as_secs_f64())]
    Timeout(Duration),

    /// A collaborator (source sync, linter) reported an error
    #[error("{0}")]
    External(String),

    /// More than one sibling failed in a parallel pipeline
    #[error("{} parallel steps failed: {}", .0.len(), join_messages(.0))]
    Parallel(Vec<StepError>),
}

impl StepError {
    pub fn config(message: impl Into<String>) -> Self {
        StepError::Config(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StepError::Timeout(_))
    }

    /// Folds the failures of a parallel batch into one error
    ///
    /// Returns `None` when nothing failed and the error itself when exactly
    /// one step failed.
    pub fn aggregate(mut errors: Vec<StepError>) -> Option<StepError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(StepError::Parallel(errors)),
        }
    }
}

fn join_messages(errors: &[StepError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_single_error_is_unwrapped() {
        let err = StepError::aggregate(vec![StepError::Command("exit status 2".into())]).unwrap();
        assert!(matches!(err, StepError::Command(_)));
    }

    #[test]
    fn test_aggregate_lists_every_failure() {
        let err = StepError::aggregate(vec![
            StepError::Command("exit status 1".into()),
            StepError::Timeout(Duration::from_secs(2)),
        ])
        .unwrap();

        let message = err.to_string();
        assert!(message.starts_with("2 parallel steps failed"));
        assert!(message.contains("exit status 1"));
        assert!(message.contains("timed out after 2s"));
    }

    #[test]
    fn test_aggregate_nothing() {
        assert!(StepError::aggregate(Vec::new()).is_none());
    }
}
