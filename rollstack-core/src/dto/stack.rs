//! Stack DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::deployment::DeploymentStatus;
use crate::domain::stack::{Network, StackStatus};
use crate::dto::integration::RegisterCandidateRequest;

/// Request to create and deploy a new stack
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStackRequest {
    pub network: Network,
    pub l1_rpc_url: String,
    pub l1_beacon_url: String,
    /// Seconds
    pub l2_block_time: u64,
    /// Seconds
    pub batch_submission_frequency: u64,
    /// Seconds
    pub output_root_frequency: u64,
    /// Seconds
    pub challenge_period: u64,
    pub admin_account: String,
    pub sequencer_account: String,
    pub batcher_account: String,
    pub proposer_account: String,
    pub aws_access_key: String,
    pub aws_secret_access_key: String,
    pub aws_region: String,
    pub chain_name: String,
    #[serde(default)]
    pub register_candidate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register_candidate_params: Option<RegisterCandidateRequest>,
}

/// Configuration of the `deploy-l1-contracts` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployL1ContractsConfig {
    pub l1_rpc_url: String,
    pub l2_block_time: u64,
    pub batch_submission_frequency: u64,
    pub output_root_frequency: u64,
    pub challenge_period: u64,
    pub admin_account: String,
    pub sequencer_account: String,
    pub batcher_account: String,
    pub proposer_account: String,
    #[serde(default)]
    pub register_candidate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register_candidate_params: Option<RegisterCandidateRequest>,
}

impl From<&DeployStackRequest> for DeployL1ContractsConfig {
    fn from(req: &DeployStackRequest) -> Self {
        Self {
            l1_rpc_url: req.l1_rpc_url.clone(),
            l2_block_time: req.l2_block_time,
            batch_submission_frequency: req.batch_submission_frequency,
            output_root_frequency: req.output_root_frequency,
            challenge_period: req.challenge_period,
            admin_account: req.admin_account.clone(),
            sequencer_account: req.sequencer_account.clone(),
            batcher_account: req.batcher_account.clone(),
            proposer_account: req.proposer_account.clone(),
            register_candidate: req.register_candidate,
            register_candidate_params: req.register_candidate_params.clone(),
        }
    }
}

/// Configuration of the `deploy-aws-infra` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployInfraConfig {
    pub chain_name: String,
    pub l1_beacon_url: String,
}

impl From<&DeployStackRequest> for DeployInfraConfig {
    fn from(req: &DeployStackRequest) -> Self {
        Self {
            chain_name: req.chain_name.clone(),
            l1_beacon_url: req.l1_beacon_url.clone(),
        }
    }
}

/// Request to point a deployed stack at new L1 endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNetworkRequest {
    pub l1_rpc_url: String,
    pub l1_beacon_url: String,
}

/// Identifier of a resource whose work was accepted for processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accepted {
    pub id: Uuid,
}

/// Current status of a stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackStatusView {
    pub status: StackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Current status of a deployment step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStatusView {
    pub status: DeploymentStatus,
}
