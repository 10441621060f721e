use async_trait::async_trait;
use rollstack_core::domain::deployment::DeploymentStep;
use rollstack_core::domain::integration::IntegrationType;
use rollstack_core::domain::stack::StackMetadata;
use rollstack_core::dto::integration::{InstallBlockExplorerRequest, UrlInfo};

use super::IntegrationHandler;
use crate::driver::{DriverClient, DriverError, DriverResult};
use crate::service::{ServiceResult, validation};

/// Blockscout explorer with its own database
pub struct BlockExplorer;

#[async_trait]
impl IntegrationHandler for BlockExplorer {
    type Params = InstallBlockExplorerRequest;
    type Info = UrlInfo;

    const KIND: IntegrationType = IntegrationType::BlockExplorer;
    const INSTALL_STEP: DeploymentStep = DeploymentStep::InstallBlockExplorer;
    const UNINSTALL_STEP: Option<DeploymentStep> = Some(DeploymentStep::UninstallBlockExplorer);

    fn validate(
        &self,
        params: InstallBlockExplorerRequest,
    ) -> ServiceResult<InstallBlockExplorerRequest> {
        validation::validate_block_explorer(&params)?;
        Ok(params)
    }

    async fn install(
        &self,
        client: &dyn DriverClient,
        params: &InstallBlockExplorerRequest,
    ) -> DriverResult<UrlInfo> {
        let url = client.install_block_explorer(params).await?;
        if url.is_empty() {
            return Err(DriverError::operation(
                "install-block-explorer",
                "block explorer url is empty",
            ));
        }
        Ok(UrlInfo { url })
    }

    async fn uninstall(&self, client: &dyn DriverClient) -> DriverResult<()> {
        client.uninstall_block_explorer().await
    }

    fn project(&self, metadata: &mut StackMetadata, info: Option<&UrlInfo>) {
        metadata.explorer_url = info.map(|i| i.url.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(password: &str) -> InstallBlockExplorerRequest {
        InstallBlockExplorerRequest {
            database_username: "explorer".to_string(),
            database_password: password.to_string(),
            coinmarketcap_key: "cmc".to_string(),
            wallet_connect_id: "wc".to_string(),
        }
    }

    #[test]
    fn test_validate_rejects_weak_password() {
        assert!(BlockExplorer.validate(request("short")).is_err());
        assert!(BlockExplorer.validate(request("long-enough-password")).is_ok());
    }

    #[test]
    fn test_project_sets_and_clears_url() {
        let mut metadata = StackMetadata::default();
        let info = UrlInfo {
            url: "https://explorer.example".to_string(),
        };

        BlockExplorer.project(&mut metadata, Some(&info));
        assert_eq!(metadata.explorer_url.as_deref(), Some("https://explorer.example"));

        BlockExplorer.project(&mut metadata, None);
        assert!(metadata.explorer_url.is_none());
    }
}
