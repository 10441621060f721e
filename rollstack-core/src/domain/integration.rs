//! Integration domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

/// Install state of one optional add-on for a stack
///
/// At most one row per (stack, type) may be in a status other than
/// `Terminated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: Uuid,
    pub stack_id: Uuid,
    pub integration_type: IntegrationType,
    pub status: IntegrationStatus,
    /// Install parameters recorded once the install succeeded
    pub config: serde_json::Value,
    /// Post-install facts reported by the driver
    pub info: serde_json::Value,
    pub log_path: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of add-on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationType {
    Bridge,
    BlockExplorer,
    Monitoring,
    RegisterCandidate,
    RegisterMetadataDao,
}

impl IntegrationType {
    pub const ALL: [IntegrationType; 5] = [
        IntegrationType::Bridge,
        IntegrationType::BlockExplorer,
        IntegrationType::Monitoring,
        IntegrationType::RegisterCandidate,
        IntegrationType::RegisterMetadataDao,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IntegrationType::Bridge => "bridge",
            IntegrationType::BlockExplorer => "block-explorer",
            IntegrationType::Monitoring => "monitoring",
            IntegrationType::RegisterCandidate => "register-candidate",
            IntegrationType::RegisterMetadataDao => "register-metadata-dao",
        }
    }

    /// Name used in user-facing messages
    pub fn display_name(self) -> &'static str {
        match self {
            IntegrationType::Bridge => "bridge",
            IntegrationType::BlockExplorer => "block explorer",
            IntegrationType::Monitoring => "monitoring",
            IntegrationType::RegisterCandidate => "register candidate",
            IntegrationType::RegisterMetadataDao => "register metadata dao",
        }
    }

    /// On-chain registrations are not add-ons running on the stack's
    /// infrastructure, so termination leaves them alone.
    pub fn is_registration(self) -> bool {
        matches!(
            self,
            IntegrationType::RegisterCandidate | IntegrationType::RegisterMetadataDao
        )
    }
}

impl std::str::FromStr for IntegrationType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntegrationType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "integration type",
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install status of an integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Stopped,
    Terminating,
    Terminated,
    Unknown,
}

impl IntegrationStatus {
    pub const ALL: [IntegrationStatus; 8] = [
        IntegrationStatus::Pending,
        IntegrationStatus::InProgress,
        IntegrationStatus::Completed,
        IntegrationStatus::Failed,
        IntegrationStatus::Stopped,
        IntegrationStatus::Terminating,
        IntegrationStatus::Terminated,
        IntegrationStatus::Unknown,
    ];

    /// Statuses counted as "installed" for the purpose of an uninstall.
    /// A running install is left out, it has to finish or be stopped first.
    pub const INSTALLED: [IntegrationStatus; 5] = [
        IntegrationStatus::Pending,
        IntegrationStatus::Completed,
        IntegrationStatus::Failed,
        IntegrationStatus::Stopped,
        IntegrationStatus::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IntegrationStatus::Pending => "Pending",
            IntegrationStatus::InProgress => "InProgress",
            IntegrationStatus::Completed => "Completed",
            IntegrationStatus::Failed => "Failed",
            IntegrationStatus::Stopped => "Stopped",
            IntegrationStatus::Terminating => "Terminating",
            IntegrationStatus::Terminated => "Terminated",
            IntegrationStatus::Unknown => "Unknown",
        }
    }

    /// Any row not yet terminated occupies the (stack, type) slot
    pub fn is_active(self) -> bool {
        self != IntegrationStatus::Terminated
    }

    pub fn is_installed(self) -> bool {
        Self::INSTALLED.contains(&self)
    }
}

impl std::str::FromStr for IntegrationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntegrationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "integration status",
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_spelling() {
        for kind in IntegrationType::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()));
            assert_eq!(kind.as_str().parse::<IntegrationType>(), Ok(kind));
        }
    }

    #[test]
    fn test_terminating_is_active_but_not_installed() {
        assert!(IntegrationStatus::Terminating.is_active());
        assert!(!IntegrationStatus::Terminating.is_installed());
        assert!(!IntegrationStatus::Terminated.is_active());
        assert!(IntegrationStatus::Stopped.is_installed());
        assert!(!IntegrationStatus::InProgress.is_installed());
    }

    #[test]
    fn test_registrations() {
        assert!(IntegrationType::RegisterCandidate.is_registration());
        assert!(IntegrationType::RegisterMetadataDao.is_registration());
        assert!(!IntegrationType::Bridge.is_registration());
    }
}
