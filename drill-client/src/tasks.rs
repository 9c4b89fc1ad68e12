//! Task intake endpoint

use crate::CoordinatorClient;
use crate::error::{ClientError, Result};
use drill_core::domain::task::Task;
use drill_core::dto::response::ConsumeTaskResponse;

/// Path the worker polls for its next task
pub const CONSUME_PATH: &str = "/api/v1/worker/task/consume";

impl CoordinatorClient {
    /// Ask the coordinator for the next pending task
    ///
    /// # Returns
    /// `Ok(None)` when nothing is pending; an `ApiError` when the coordinator
    /// answers with a non-zero code.
    pub async fn consume_task(&self) -> Result<Option<Task>> {
        let response = self.client.get(self.url(CONSUME_PATH)).send().await?;
        let body: ConsumeTaskResponse = self.handle_response(response).await?;

        if body.code != 0 {
            return Err(ClientError::ApiError {
                status: 200,
                message: format!("code {}: {}", body.code, body.msg),
            });
        }

        Ok(body.data)
    }
}
