//! Deployment and log API endpoints

use crate::RollstackClient;
use crate::error::Result;
use rollstack_core::domain::deployment::Deployment;
use rollstack_core::dto::log::{LogPage, LogQuery};
use rollstack_core::dto::stack::DeploymentStatusView;
use uuid::Uuid;

impl RollstackClient {
    // =============================================================================
    // Deployments
    // =============================================================================

    pub async fn list_deployments(&self, stack_id: Uuid) -> Result<Vec<Deployment>> {
        let url = self.stacks_url(&format!("/{stack_id}/deployments"));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    pub async fn get_deployment(&self, stack_id: Uuid, deployment_id: Uuid) -> Result<Deployment> {
        let url = self.stacks_url(&format!("/{stack_id}/deployments/{deployment_id}"));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    pub async fn get_deployment_status(
        &self,
        stack_id: Uuid,
        deployment_id: Uuid,
    ) -> Result<DeploymentStatusView> {
        let url = self.stacks_url(&format!("/{stack_id}/deployments/{deployment_id}/status"));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Logs
    // =============================================================================

    /// One page of a deployment's logs
    ///
    /// Pass the returned `next_cursor` as `after_id` to read on.
    pub async fn get_deployment_logs(
        &self,
        stack_id: Uuid,
        deployment_id: Uuid,
        query: &LogQuery,
    ) -> Result<LogPage> {
        let url = self.stacks_url(&format!("/{stack_id}/deployments/{deployment_id}/logs"));
        let response = self.client.get(&url).query(query).send().await?;

        self.handle_response(response).await
    }

    /// The complete log file of a deployment
    pub async fn download_deployment_logs(
        &self,
        stack_id: Uuid,
        deployment_id: Uuid,
    ) -> Result<String> {
        let url = self.stacks_url(&format!(
            "/{stack_id}/deployments/{deployment_id}/logs/download"
        ));
        let response = self.client.get(&url).send().await?;

        self.handle_download(response).await
    }

    /// One page over the logs of every deployment of a stack
    pub async fn get_stack_logs(&self, stack_id: Uuid, query: &LogQuery) -> Result<LogPage> {
        let url = self.stacks_url(&format!("/{stack_id}/logs"));
        let response = self.client.get(&url).query(query).send().await?;

        self.handle_response(response).await
    }
}
