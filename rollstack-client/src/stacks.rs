//! Stack-related API endpoints

use crate::RollstackClient;
use crate::error::Result;
use rollstack_core::domain::stack::Stack;
use rollstack_core::dto::stack::{Accepted, DeployStackRequest, StackStatusView, UpdateNetworkRequest};
use uuid::Uuid;

impl RollstackClient {
    // =============================================================================
    // Stack Lifecycle
    // =============================================================================

    /// Create a stack and schedule its deployment
    ///
    /// # Returns
    /// The id of the new stack
    pub async fn create_stack(&self, req: &DeployStackRequest) -> Result<Accepted> {
        let url = self.stacks_url("");
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Cancel a running deployment
    pub async fn stop_stack(&self, id: Uuid) -> Result<Accepted> {
        let url = self.stacks_url(&format!("/{id}/stop"));
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Continue a stopped or failed deployment
    pub async fn resume_stack(&self, id: Uuid) -> Result<Accepted> {
        let url = self.stacks_url(&format!("/{id}/resume"));
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Point a deployed stack at new L1 endpoints
    pub async fn update_network(&self, id: Uuid, req: &UpdateNetworkRequest) -> Result<Accepted> {
        let url = self.stacks_url(&format!("/{id}/network"));
        let response = self.client.put(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Destroy the stack's infrastructure
    pub async fn terminate_stack(&self, id: Uuid) -> Result<Accepted> {
        let url = self.stacks_url(&format!("/{id}"));
        let response = self.client.delete(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Stack Queries
    // =============================================================================

    pub async fn list_stacks(&self) -> Result<Vec<Stack>> {
        let url = self.stacks_url("");
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    pub async fn get_stack(&self, id: Uuid) -> Result<Stack> {
        let url = self.stacks_url(&format!("/{id}"));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    pub async fn get_stack_status(&self, id: Uuid) -> Result<StackStatusView> {
        let url = self.stacks_url(&format!("/{id}/status"));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Raw rollup config JSON of a deployed stack
    pub async fn download_rollup_config(&self, id: Uuid) -> Result<String> {
        let url = self.stacks_url(&format!("/{id}/rollup-config"));
        let response = self.client.get(&url).send().await?;

        self.handle_download(response).await
    }
}
