use async_trait::async_trait;
use rollstack_core::domain::deployment::DeploymentStep;
use rollstack_core::domain::integration::{IntegrationStatus, IntegrationType};
use rollstack_core::dto::integration::RegisterMetadataDaoRequest;

use super::IntegrationHandler;
use crate::driver::{DriverClient, DriverResult};
use crate::service::{ServiceResult, validation};

/// Publication of the chain's metadata to the DAO registry
///
/// A later registration replaces a finished or failed one.
pub struct MetadataRegistration;

#[async_trait]
impl IntegrationHandler for MetadataRegistration {
    type Params = RegisterMetadataDaoRequest;
    type Info = serde_json::Value;

    const KIND: IntegrationType = IntegrationType::RegisterMetadataDao;
    const INSTALL_STEP: DeploymentStep = DeploymentStep::RegisterMetadataDao;
    const UNINSTALL_STEP: Option<DeploymentStep> = None;

    fn validate(
        &self,
        params: RegisterMetadataDaoRequest,
    ) -> ServiceResult<RegisterMetadataDaoRequest> {
        validation::validate_metadata_dao(params)
    }

    fn supersedes(&self, status: IntegrationStatus) -> bool {
        matches!(status, IntegrationStatus::Completed | IntegrationStatus::Failed)
    }

    async fn install(
        &self,
        client: &dyn DriverClient,
        params: &RegisterMetadataDaoRequest,
    ) -> DriverResult<serde_json::Value> {
        client.register_metadata_dao(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supersedes_only_settled_rows() {
        let handler = MetadataRegistration;
        assert!(handler.supersedes(IntegrationStatus::Completed));
        assert!(handler.supersedes(IntegrationStatus::Failed));
        assert!(!handler.supersedes(IntegrationStatus::InProgress));
        assert!(!handler.supersedes(IntegrationStatus::Pending));
    }

    #[test]
    fn test_validate_fills_metadata() {
        let req = RegisterMetadataDaoRequest {
            username: "operator".to_string(),
            token: "ghp_token".to_string(),
            email: "ops@example.com".to_string(),
            metadata: None,
        };
        let req = MetadataRegistration.validate(req).unwrap();
        assert!(req.metadata.is_some());
    }
}
