//! On-disk layout of workspaces and step logs

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rollstack_core::domain::stack::{Network, StackType};
use uuid::Uuid;

/// `{root}/deployments/{stack_type}/{network}/{stack_id}`
pub fn deployment_path(root: &Path, stack_type: StackType, network: Network, id: Uuid) -> PathBuf {
    root.join("deployments")
        .join(stack_type.as_str())
        .join(network.as_str().to_lowercase())
        .join(id.to_string())
}

/// `{root}/logs/{stack_id}/{timestamp}_{label}_logs.txt`
///
/// `label` is a step identifier or the name of an operation that has no
/// step of its own.
pub fn log_path(root: &Path, stack_id: Uuid, label: &str, at: DateTime<Utc>) -> PathBuf {
    root.join("logs").join(stack_id.to_string()).join(format!(
        "{}_{}_logs.txt",
        at.format("%Y-%m-%d-%H-%M-%S"),
        label
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rollstack_core::domain::deployment::DeploymentStep;

    #[test]
    fn test_deployment_path_layout() {
        let id = Uuid::nil();
        let path = deployment_path(
            Path::new("storage"),
            StackType::OptimisticRollup,
            Network::Testnet,
            id,
        );
        assert_eq!(
            path,
            PathBuf::from(format!("storage/deployments/optimistic-rollup/testnet/{id}"))
        );
    }

    #[test]
    fn test_log_path_is_timestamped() {
        let id = Uuid::nil();
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        let path = log_path(
            Path::new("/srv"),
            id,
            DeploymentStep::DeployAwsInfra.as_str(),
            at,
        );
        assert_eq!(
            path,
            PathBuf::from(format!(
                "/srv/logs/{id}/2025-03-09-14-05-07_deploy-aws-infra_logs.txt"
            ))
        );
    }
}
