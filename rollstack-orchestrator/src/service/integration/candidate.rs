use async_trait::async_trait;
use rollstack_core::domain::deployment::DeploymentStep;
use rollstack_core::domain::integration::{IntegrationStatus, IntegrationType};
use rollstack_core::dto::integration::RegisterCandidateRequest;

use super::IntegrationHandler;
use crate::driver::{DriverClient, DriverResult};
use crate::service::{ServiceResult, validation};

/// On-chain registration of the stack as a DAO candidate
///
/// Registrations cannot be undone. A failed attempt may be retried.
pub struct CandidateRegistration;

#[async_trait]
impl IntegrationHandler for CandidateRegistration {
    type Params = RegisterCandidateRequest;
    type Info = serde_json::Value;

    const KIND: IntegrationType = IntegrationType::RegisterCandidate;
    const INSTALL_STEP: DeploymentStep = DeploymentStep::RegisterCandidate;
    const UNINSTALL_STEP: Option<DeploymentStep> = None;

    fn validate(&self, params: RegisterCandidateRequest) -> ServiceResult<RegisterCandidateRequest> {
        validation::validate_candidate(&params)?;
        Ok(params)
    }

    fn supersedes(&self, status: IntegrationStatus) -> bool {
        status == IntegrationStatus::Failed
    }

    async fn install(
        &self,
        client: &dyn DriverClient,
        params: &RegisterCandidateRequest,
    ) -> DriverResult<serde_json::Value> {
        client.verify_register_candidates(params).await?;
        client.register_candidate_info(params).await
    }
}
