//! Pipeline domain types
//!
//! A pipeline is a recursive step-tree: every step is either a leaf job or a
//! nested pipeline, and every level runs its steps either one after the other
//! or all at once.

use serde::{Deserialize, Serialize};

/// Ordered steps plus the execution policy for this level of the tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDescription {
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub parallel: bool,
}

impl PipelineDescription {
    /// Creates a pipeline whose steps run in list order
    pub fn sequential(steps: Vec<Step>) -> Self {
        Self {
            steps,
            parallel: false,
        }
    }

    /// Creates a pipeline whose steps run concurrently
    pub fn parallel(steps: Vec<Step>) -> Self {
        Self {
            steps,
            parallel: true,
        }
    }
}

/// Kind tag carried by a step on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepType {
    Job,
    SubPipeline,
}

/// One node of a pipeline, as received from the coordinator
///
/// The wire shape allows any combination of the two optional fields. Use
/// [`Step::body`] to obtain the validated variant before acting on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_payload: Option<JobPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_pipeline: Option<PipelineDescription>,
}

/// Validated contents of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepBody<'a> {
    Job(&'a JobPayload),
    SubPipeline(&'a PipelineDescription),
}

/// A step whose type tag disagrees with the fields it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepShapeError {
    pub step: String,
    pub reason: String,
}

impl std::fmt::Display for StepShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid step '{}': {}", self.step, self.reason)
    }
}

impl std::error::Error for StepShapeError {}

impl Step {
    /// Creates a leaf job step
    pub fn job(name: impl Into<String>, kind: JobKind, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            step_type: StepType::Job,
            job_payload: Some(JobPayload { kind, payload }),
            sub_pipeline: None,
        }
    }

    /// Creates a step that runs a nested pipeline
    pub fn sub_pipeline(name: impl Into<String>, pipeline: PipelineDescription) -> Self {
        Self {
            name: name.into(),
            step_type: StepType::SubPipeline,
            job_payload: None,
            sub_pipeline: Some(pipeline),
        }
    }

    /// Checks the type/payload invariant and returns the matching variant
    ///
    /// `Job` steps must carry a job payload and no sub-pipeline;
    /// `SubPipeline` steps must carry a sub-pipeline and no job payload.
    pub fn body(&self) -> Result<StepBody<'_>, StepShapeError> {
        match (self.step_type, &self.job_payload, &self.sub_pipeline) {
            (StepType::Job, Some(payload), None) => Ok(StepBody::Job(payload)),
            (StepType::SubPipeline, None, Some(pipeline)) => Ok(StepBody::SubPipeline(pipeline)),
            (StepType::Job, None, _) => Err(self.shape_error("job step has no job payload")),
            (StepType::Job, Some(_), Some(_)) => {
                Err(self.shape_error("job step must not carry a sub-pipeline"))
            }
            (StepType::SubPipeline, _, None) => {
                Err(self.shape_error("sub-pipeline step has no nested pipeline"))
            }
            (StepType::SubPipeline, Some(_), Some(_)) => {
                Err(self.shape_error("sub-pipeline step must not carry a job payload"))
            }
        }
    }

    fn shape_error(&self, reason: &str) -> StepShapeError {
        StepShapeError {
            step: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Job kinds understood by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    SourceSync,
    UnitTest,
    CodeCheck,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::SourceSync => write!(f, "sourceSync"),
            JobKind::UnitTest => write!(f, "unitTest"),
            JobKind::CodeCheck => write!(f, "codeCheck"),
        }
    }
}

/// Leaf job: a kind tag plus a body only the matching handler decodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    #[serde(rename = "type")]
    pub kind: JobKind,
    #[serde(default)]
    pub payload: serde_json::Value,
}
