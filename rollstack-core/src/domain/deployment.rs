//! Deployment domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

/// One executable step of a stack's lifecycle
///
/// Rows are append-only: a resumed stack gets new rows for the steps it
/// still has to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub stack_id: Uuid,
    pub step: DeploymentStep,
    pub status: DeploymentStatus,
    pub log_path: String,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Run status of a deployment step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeploymentStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Stopped,
}

impl DeploymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "Pending",
            DeploymentStatus::InProgress => "InProgress",
            DeploymentStatus::Success => "Success",
            DeploymentStatus::Failed => "Failed",
            DeploymentStatus::Stopped => "Stopped",
        }
    }

    /// Success and Failed rows never change again
    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentStatus::Success | DeploymentStatus::Failed)
    }

    /// Statuses that close a run and stamp `finished_at`
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            DeploymentStatus::Success | DeploymentStatus::Failed | DeploymentStatus::Stopped
        )
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(DeploymentStatus::Pending),
            "InProgress" => Ok(DeploymentStatus::InProgress),
            "Success" => Ok(DeploymentStatus::Success),
            "Failed" => Ok(DeploymentStatus::Failed),
            "Stopped" => Ok(DeploymentStatus::Stopped),
            other => Err(UnknownVariant {
                kind: "deployment status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of an executable step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStep {
    DeployL1Contracts,
    DeployAwsInfra,
    DestroyChain,
    InstallBridge,
    UninstallBridge,
    InstallBlockExplorer,
    UninstallBlockExplorer,
    InstallMonitoring,
    UninstallMonitoring,
    RegisterCandidate,
    RegisterMetadataDao,
}

impl DeploymentStep {
    pub const ALL: [DeploymentStep; 11] = [
        DeploymentStep::DeployL1Contracts,
        DeploymentStep::DeployAwsInfra,
        DeploymentStep::DestroyChain,
        DeploymentStep::InstallBridge,
        DeploymentStep::UninstallBridge,
        DeploymentStep::InstallBlockExplorer,
        DeploymentStep::UninstallBlockExplorer,
        DeploymentStep::InstallMonitoring,
        DeploymentStep::UninstallMonitoring,
        DeploymentStep::RegisterCandidate,
        DeploymentStep::RegisterMetadataDao,
    ];

    /// Steps executed by the stack deploy task, in execution order
    pub const DEPLOY_SEQUENCE: [DeploymentStep; 2] =
        [DeploymentStep::DeployL1Contracts, DeploymentStep::DeployAwsInfra];

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentStep::DeployL1Contracts => "deploy-l1-contracts",
            DeploymentStep::DeployAwsInfra => "deploy-aws-infra",
            DeploymentStep::DestroyChain => "destroy-chain",
            DeploymentStep::InstallBridge => "install-bridge",
            DeploymentStep::UninstallBridge => "uninstall-bridge",
            DeploymentStep::InstallBlockExplorer => "install-block-explorer",
            DeploymentStep::UninstallBlockExplorer => "uninstall-block-explorer",
            DeploymentStep::InstallMonitoring => "install-monitoring",
            DeploymentStep::UninstallMonitoring => "uninstall-monitoring",
            DeploymentStep::RegisterCandidate => "register-candidate",
            DeploymentStep::RegisterMetadataDao => "register-metadata-dao",
        }
    }

    /// Position within the deploy sequence, `None` for non-deploy steps
    pub fn deploy_order(self) -> Option<usize> {
        Self::DEPLOY_SEQUENCE.iter().position(|step| *step == self)
    }
}

impl std::str::FromStr for DeploymentStep {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeploymentStep::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "deployment step",
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for DeploymentStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(DeploymentStatus::Success.is_terminal());
        assert!(DeploymentStatus::Failed.is_terminal());
        assert!(!DeploymentStatus::Stopped.is_terminal());
        assert!(!DeploymentStatus::InProgress.is_terminal());
        assert!(DeploymentStatus::Stopped.is_finished());
    }

    #[test]
    fn test_step_serde_matches_as_str() {
        for step in DeploymentStep::ALL {
            let json = serde_json::to_value(step).unwrap();
            assert_eq!(json, serde_json::Value::String(step.as_str().to_string()));
            assert_eq!(step.as_str().parse::<DeploymentStep>(), Ok(step));
        }
    }

    #[test]
    fn test_contracts_precede_infrastructure() {
        assert_eq!(DeploymentStep::DeployL1Contracts.deploy_order(), Some(0));
        assert_eq!(DeploymentStep::DeployAwsInfra.deploy_order(), Some(1));
        assert_eq!(DeploymentStep::DestroyChain.deploy_order(), None);
    }
}
