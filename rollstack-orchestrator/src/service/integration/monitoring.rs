use async_trait::async_trait;
use rollstack_core::domain::deployment::DeploymentStep;
use rollstack_core::domain::integration::IntegrationType;
use rollstack_core::domain::stack::StackMetadata;
use rollstack_core::dto::integration::{InstallMonitoringRequest, MonitoringInfo};

use super::IntegrationHandler;
use crate::driver::{DriverClient, DriverResult};
use crate::service::{ServiceResult, validation};

/// Grafana dashboards with optional alert routing
pub struct Monitoring;

#[async_trait]
impl IntegrationHandler for Monitoring {
    type Params = InstallMonitoringRequest;
    type Info = MonitoringInfo;

    const KIND: IntegrationType = IntegrationType::Monitoring;
    const INSTALL_STEP: DeploymentStep = DeploymentStep::InstallMonitoring;
    const UNINSTALL_STEP: Option<DeploymentStep> = Some(DeploymentStep::UninstallMonitoring);

    fn validate(&self, params: InstallMonitoringRequest) -> ServiceResult<InstallMonitoringRequest> {
        validation::validate_monitoring(&params)?;
        Ok(params)
    }

    async fn install(
        &self,
        client: &dyn DriverClient,
        params: &InstallMonitoringRequest,
    ) -> DriverResult<MonitoringInfo> {
        client.install_monitoring(params).await
    }

    async fn uninstall(&self, client: &dyn DriverClient) -> DriverResult<()> {
        client.uninstall_monitoring().await
    }

    fn project(&self, metadata: &mut StackMetadata, info: Option<&MonitoringInfo>) {
        metadata.grafana_url = info
            .map(|i| i.grafana_url.clone())
            .filter(|url| !url.is_empty());
    }
}
