//! Integration API endpoints

use crate::RollstackClient;
use crate::error::Result;
use rollstack_core::domain::integration::{Integration, IntegrationType};
use rollstack_core::dto::integration::{InstallRequest, MetadataDaoRegistration};
use rollstack_core::dto::stack::Accepted;
use uuid::Uuid;

impl RollstackClient {
    /// Active integrations of a stack
    pub async fn list_integrations(&self, stack_id: Uuid) -> Result<Vec<Integration>> {
        let url = self.stacks_url(&format!("/{stack_id}/integrations"));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    pub async fn get_integration(&self, stack_id: Uuid, integration_id: Uuid) -> Result<Integration> {
        let url = self.stacks_url(&format!("/{stack_id}/integrations/{integration_id}"));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Schedule the install of an add-on
    ///
    /// # Returns
    /// The id of the integration row tracking the install
    pub async fn install_integration(&self, stack_id: Uuid, req: &InstallRequest) -> Result<Accepted> {
        let url = self.stacks_url(&format!(
            "/{stack_id}/integrations/{}",
            req.integration_type()
        ));
        let params = match req {
            InstallRequest::Bridge(p) => serde_json::to_value(p),
            InstallRequest::BlockExplorer(p) => serde_json::to_value(p),
            InstallRequest::Monitoring(p) => serde_json::to_value(p),
            InstallRequest::RegisterCandidate(p) => serde_json::to_value(p),
            InstallRequest::RegisterMetadataDao(p) => serde_json::to_value(p),
        }
        .map_err(|e| crate::ClientError::ParseError(e.to_string()))?;

        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(&params).send().await?;

        self.handle_response(response).await
    }

    /// Schedule the removal of an add-on
    pub async fn uninstall_integration(
        &self,
        stack_id: Uuid,
        kind: IntegrationType,
    ) -> Result<Accepted> {
        let url = self.stacks_url(&format!("/{stack_id}/integrations/{kind}"));
        let response = self.client.delete(&url).send().await?;

        self.handle_response(response).await
    }

    /// Stored state of the metadata registration
    pub async fn get_metadata_dao(&self, stack_id: Uuid) -> Result<MetadataDaoRegistration> {
        let url = self.stacks_url(&format!("/{stack_id}/integrations/register-metadata-dao"));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
