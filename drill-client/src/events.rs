//! Status event endpoint

use crate::CoordinatorClient;
use crate::error::Result;
use drill_core::dto::event::EventEnvelope;
use drill_core::dto::response::Ack;

/// Path of the coordinator's single update endpoint
pub const UPDATE_PATH: &str = "/api/v1/worker/task/update";

impl CoordinatorClient {
    /// Post one task or step event to the coordinator
    ///
    /// # Returns
    /// The coordinator's acknowledgement. A non-zero `code` is returned as-is;
    /// only transport and HTTP status failures are errors.
    pub async fn post_event(&self, envelope: &EventEnvelope) -> Result<Ack> {
        let response = self
            .client
            .post(self.url(UPDATE_PATH))
            .json(envelope)
            .send()
            .await?;

        self.handle_response(response).await
    }
}
