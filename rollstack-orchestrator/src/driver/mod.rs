//! Provisioning driver boundary
//!
//! The orchestrator never provisions anything itself. Every chain, AWS and
//! add-on operation goes through a [`DriverClient`] obtained from a
//! [`StackDriver`] for one step's session. The session pins the workspace
//! directory and the log file the driver writes its progress to.

mod process;

pub use process::ProcessDriver;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rollstack_core::domain::stack::Network;
use rollstack_core::dto::integration::{
    InstallBlockExplorerRequest, InstallMonitoringRequest, MonitoringInfo,
    RegisterCandidateRequest, RegisterMetadataDaoRequest,
};
use rollstack_core::dto::stack::{DeployInfraConfig, DeployL1ContractsConfig, UpdateNetworkRequest};
use serde::{Deserialize, Serialize};

/// Result type alias using [`DriverError`]
pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to connect driver: {0}")]
    Connect(String),

    #[error("{operation} failed: {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },

    #[error("driver io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid driver output: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DriverError {
    pub fn operation(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            message: message.into(),
        }
    }
}

/// AWS credentials handed to infrastructure operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsCredentials {
    pub access_key: String,
    pub secret_access_key: String,
    pub region: String,
}

/// Everything a driver needs to act on one stack for one step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverSession {
    pub network: Network,
    pub deployment_path: PathBuf,
    pub log_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsCredentials>,
    #[serde(default)]
    pub register_candidate: bool,
}

/// Facts about a deployed chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInformation {
    pub l2_rpc_url: String,
    pub bridge_url: String,
    pub block_explorer_url: String,
    pub rollup_config_url: String,
    pub l1_chain_id: u64,
    pub l2_chain_id: u64,
    #[serde(default)]
    pub monitoring_url: String,
}

/// Factory for per-step driver clients
#[async_trait]
pub trait StackDriver: Send + Sync {
    async fn connect(&self, session: DriverSession) -> DriverResult<Arc<dyn DriverClient>>;
}

/// Operations the driver performs on a connected session
///
/// Calls are long-running. Callers cancel one by dropping its future.
#[async_trait]
pub trait DriverClient: Send + Sync {
    async fn deploy_l1_contracts(&self, config: &DeployL1ContractsConfig) -> DriverResult<()>;

    async fn deploy_aws_infrastructure(&self, config: &DeployInfraConfig) -> DriverResult<()>;

    async fn destroy_aws_infrastructure(&self) -> DriverResult<()>;

    async fn show_chain_information(&self) -> DriverResult<ChainInformation>;

    async fn update_network(&self, request: &UpdateNetworkRequest) -> DriverResult<()>;

    /// Returns the bridge URL
    async fn install_bridge(&self) -> DriverResult<String>;

    async fn uninstall_bridge(&self) -> DriverResult<()>;

    /// Returns the explorer URL
    async fn install_block_explorer(
        &self,
        params: &InstallBlockExplorerRequest,
    ) -> DriverResult<String>;

    async fn uninstall_block_explorer(&self) -> DriverResult<()>;

    async fn install_monitoring(
        &self,
        params: &InstallMonitoringRequest,
    ) -> DriverResult<MonitoringInfo>;

    async fn uninstall_monitoring(&self) -> DriverResult<()>;

    async fn verify_register_candidates(
        &self,
        params: &RegisterCandidateRequest,
    ) -> DriverResult<()>;

    /// Registration details of the stack's candidate
    async fn register_candidate_info(
        &self,
        params: &RegisterCandidateRequest,
    ) -> DriverResult<serde_json::Value>;

    async fn register_metadata_dao(
        &self,
        params: &RegisterMetadataDaoRequest,
    ) -> DriverResult<serde_json::Value>;
}
