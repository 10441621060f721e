//! Stack domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

/// One rollup deployment instance and its lifecycle state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    pub id: Uuid,
    pub name: String,
    pub stack_type: StackType,
    pub network: Network,
    /// The deploy request the stack was created from
    pub config: serde_json::Value,
    pub deployment_path: String,
    pub metadata: Option<StackMetadata>,
    pub status: StackStatus,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Endpoints and chain facts reported once a stack is up
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2_rpc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l1_chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2_chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grafana_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollup_config_url: Option<String>,
}

/// Rollup flavour of a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StackType {
    OptimisticRollup,
    ZkRollup,
}

impl StackType {
    pub fn as_str(self) -> &'static str {
        match self {
            StackType::OptimisticRollup => "optimistic-rollup",
            StackType::ZkRollup => "zk-rollup",
        }
    }
}

impl std::str::FromStr for StackType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optimistic-rollup" => Ok(StackType::OptimisticRollup),
            "zk-rollup" => Ok(StackType::ZkRollup),
            other => Err(UnknownVariant {
                kind: "stack type",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for StackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target L1 network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
    LocalDevnet,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "Mainnet",
            Network::Testnet => "Testnet",
            Network::LocalDevnet => "LocalDevnet",
        }
    }

    /// Human readable name of the settlement layer
    pub fn layer1_name(self) -> &'static str {
        match self {
            Network::Mainnet => "Ethereum",
            Network::Testnet | Network::LocalDevnet => "Ethereum Sepolia",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Mainnet" => Ok(Network::Mainnet),
            "Testnet" => Ok(Network::Testnet),
            "LocalDevnet" => Ok(Network::LocalDevnet),
            other => Err(UnknownVariant {
                kind: "network",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stack lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackStatus {
    Pending,
    Deploying,
    Deployed,
    Updating,
    Stopped,
    Terminating,
    Terminated,
    FailedToDeploy,
    FailedToUpdate,
    FailedToTerminate,
    Unknown,
}

impl StackStatus {
    pub const ALL: [StackStatus; 11] = [
        StackStatus::Pending,
        StackStatus::Deploying,
        StackStatus::Deployed,
        StackStatus::Updating,
        StackStatus::Stopped,
        StackStatus::Terminating,
        StackStatus::Terminated,
        StackStatus::FailedToDeploy,
        StackStatus::FailedToUpdate,
        StackStatus::FailedToTerminate,
        StackStatus::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StackStatus::Pending => "Pending",
            StackStatus::Deploying => "Deploying",
            StackStatus::Deployed => "Deployed",
            StackStatus::Updating => "Updating",
            StackStatus::Stopped => "Stopped",
            StackStatus::Terminating => "Terminating",
            StackStatus::Terminated => "Terminated",
            StackStatus::FailedToDeploy => "FailedToDeploy",
            StackStatus::FailedToUpdate => "FailedToUpdate",
            StackStatus::FailedToTerminate => "FailedToTerminate",
            StackStatus::Unknown => "Unknown",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Re-writing the current status is always allowed so that concurrent
    /// writers agreeing on an outcome (a stop request racing the cancelled
    /// task) do not conflict.
    pub fn can_transition_to(self, next: StackStatus) -> bool {
        use StackStatus::*;

        if self == next {
            return true;
        }

        matches!(
            (self, next),
            (Pending, Deploying)
                | (Pending, Terminating)
                | (Deploying, Deployed)
                | (Deploying, FailedToDeploy)
                | (Deploying, Stopped)
                | (Deployed, Updating)
                | (Deployed, Terminating)
                | (Updating, Deployed)
                | (Updating, FailedToUpdate)
                | (FailedToUpdate, Updating)
                | (FailedToUpdate, Terminating)
                | (Stopped, Pending)
                | (Stopped, Terminating)
                | (FailedToDeploy, Pending)
                | (FailedToDeploy, Terminating)
                | (Terminating, Terminated)
                | (Terminating, FailedToTerminate)
                | (Terminated, Pending)
                | (Terminated, Terminating)
                | (FailedToTerminate, Terminating)
        )
    }

    /// Statuses from which a stack may be resumed
    pub fn is_resumable(self) -> bool {
        matches!(
            self,
            StackStatus::Stopped | StackStatus::FailedToDeploy | StackStatus::Terminated
        )
    }

    /// Statuses during which a scheduled task owns the stack
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            StackStatus::Deploying | StackStatus::Updating | StackStatus::Terminating
        )
    }
}

impl std::str::FromStr for StackStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StackStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "stack status",
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
