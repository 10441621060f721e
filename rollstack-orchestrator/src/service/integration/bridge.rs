use async_trait::async_trait;
use rollstack_core::domain::deployment::DeploymentStep;
use rollstack_core::domain::integration::IntegrationType;
use rollstack_core::domain::stack::StackMetadata;
use rollstack_core::dto::integration::{InstallBridgeRequest, UrlInfo};

use super::IntegrationHandler;
use crate::driver::{DriverClient, DriverError, DriverResult};

/// The L1/L2 token bridge UI
pub struct Bridge;

#[async_trait]
impl IntegrationHandler for Bridge {
    type Params = InstallBridgeRequest;
    type Info = UrlInfo;

    const KIND: IntegrationType = IntegrationType::Bridge;
    const INSTALL_STEP: DeploymentStep = DeploymentStep::InstallBridge;
    const UNINSTALL_STEP: Option<DeploymentStep> = Some(DeploymentStep::UninstallBridge);

    async fn install(
        &self,
        client: &dyn DriverClient,
        _params: &InstallBridgeRequest,
    ) -> DriverResult<UrlInfo> {
        let url = client.install_bridge().await?;
        if url.is_empty() {
            return Err(DriverError::operation("install-bridge", "bridge url is empty"));
        }
        Ok(UrlInfo { url })
    }

    async fn uninstall(&self, client: &dyn DriverClient) -> DriverResult<()> {
        client.uninstall_bridge().await
    }

    fn project(&self, metadata: &mut StackMetadata, info: Option<&UrlInfo>) {
        metadata.bridge_url = info.map(|i| i.url.clone());
    }
}
