//! Rollstack HTTP Client
//!
//! A type-safe client for the Rollstack orchestrator API. Responses arrive
//! in the API's envelope; the client unwraps the payload and turns failure
//! envelopes into [`ClientError::ApiError`].
//!
//! # Example
//!
//! ```no_run
//! use rollstack_client::RollstackClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RollstackClient::new("http://localhost:8000");
//!
//!     for stack in client.list_stacks().await? {
//!         println!("{} {}", stack.id, stack.status);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod integrations;
mod logs;
mod stacks;

pub use error::{ClientError, Result};

use reqwest::Client;
use rollstack_core::dto::envelope::Envelope;
use serde::de::DeserializeOwned;

/// Path the stack API is mounted under
const STACKS_PATH: &str = "/api/v1/stacks/thanos";

/// HTTP client for the Rollstack orchestrator API
///
/// Methods are grouped by resource:
/// - Stack lifecycle and queries
/// - Deployments and their logs
/// - Integrations
#[derive(Debug, Clone)]
pub struct RollstackClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8000")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl RollstackClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn stacks_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, STACKS_PATH, path)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the envelope and return its payload
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let envelope: Envelope<T> = self.read_envelope(response).await?;
        envelope
            .data
            .ok_or_else(|| ClientError::ParseError("response carried no data".to_string()))
    }

    async fn read_envelope<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<Envelope<T>> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope>(&body)
                .map(|envelope| envelope.message)
                .unwrap_or(body);
            return Err(ClientError::api_error(status.as_u16(), message));
        }

        serde_json::from_str(&body)
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status of a raw (non-envelope) download
    async fn handle_download(&self, response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope>(&body)
                .map(|envelope| envelope.message)
                .unwrap_or(body);
            return Err(ClientError::api_error(status.as_u16(), message));
        }
        Ok(body)
    }
}
