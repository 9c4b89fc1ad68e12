//! Drill HTTP Client
//!
//! A small, typed HTTP client for the coordinator that hands tasks to Drill
//! workers and collects their status events.
//!
//! # Example
//!
//! ```no_run
//! use drill_client::CoordinatorClient;
//! use drill_core::domain::status::TaskStatus;
//! use drill_core::dto::event::TaskEvent;
//! use std::time::Duration;
//!
//! # async fn example() -> drill_client::Result<()> {
//! let client = CoordinatorClient::new("http://localhost:8080", "secret", Duration::from_secs(20))?;
//!
//! let envelope = TaskEvent::task(42, TaskStatus::Running, "")
//!     .into_envelope()
//!     .expect("status events always serialize");
//! let ack = client.post_event(&envelope).await?;
//! println!("coordinator answered code={}", ack.code);
//! # Ok(())
//! # }
//! ```

pub mod error;
mod events;
mod tasks;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Header carrying the worker's auth token
pub const TOKEN_HEADER: &str = "Token";

/// HTTP client for the coordinator API
///
/// Every request carries the worker token and is bounded by the client-wide
/// timeout given at construction.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    /// Base URL of the coordinator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl CoordinatorClient {
    /// Create a new coordinator client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the coordinator API
    /// * `token` - Auth token sent with every request
    /// * `timeout` - Upper bound for any single request
    pub fn new(base_url: impl Into<String>, token: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(token)
            .map_err(|e| ClientError::InvalidRequest(format!("invalid token header: {}", e)))?;
        headers.insert(TOKEN_HEADER, value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self::with_client(base_url, client))
    }

    /// Create a new coordinator client with a custom HTTP client
    ///
    /// The caller is responsible for auth headers and timeouts.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the coordinator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            debug!(
                status = status.as_u16(),
                "Coordinator returned an error: {}", error_text
            );
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
