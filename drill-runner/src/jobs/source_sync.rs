use async_trait::async_trait;
use drill_core::domain::status::StepStatus;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::{JobHandler, StepContext, decode_payload};
use crate::collaborators::SourceSync;
use crate::error::StepError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceSyncPayload {
    git_http_url: String,
    #[serde(default)]
    access_token: String,
}

/// Brings the task's checkout up to date
pub struct SourceSyncHandler {
    sync: Arc<dyn SourceSync>,
}

impl SourceSyncHandler {
    pub fn new(sync: Arc<dyn SourceSync>) -> Self {
        Self { sync }
    }
}

#[async_trait]
impl JobHandler for SourceSyncHandler {
    async fn run(
        &self,
        step: &StepContext<'_>,
        payload: &serde_json::Value,
    ) -> Result<(), StepError> {
        let payload = match decode_payload::<SourceSyncPayload>("source sync", payload) {
            Ok(payload) => payload,
            Err(e) => {
                step.report(StepStatus::Failed, e.to_string()).await;
                return Err(e);
            }
        };
        let dir = match step.checkout_dir() {
            Ok(dir) => dir,
            Err(e) => {
                step.report(StepStatus::Failed, e.to_string()).await;
                return Err(e);
            }
        };

        info!(
            task_id = step.task.task_id,
            step = step.step_name,
            dir = %dir.display(),
            "Syncing sources"
        );
        let output = self
            .sync
            .sync(&payload.git_http_url, &dir, &payload.access_token)
            .await;

        match output.result {
            Ok(()) => {
                step.report(StepStatus::Success, output.progress).await;
                Ok(())
            }
            Err(e) => {
                step.report(
                    StepStatus::Failed,
                    format!("{}\nerror: {:#}", output.progress, e),
                )
                .await;
                Err(StepError::External(format!("source sync failed: {:#}", e)))
            }
        }
    }
}
