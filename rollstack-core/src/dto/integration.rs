//! Integration DTOs
//!
//! Install payloads for each add-on, the post-install info they produce and
//! the tagged union the integration manager dispatches on.

use serde::{Deserialize, Serialize};

use crate::domain::integration::IntegrationType;

// =============================================================================
// Install Payloads
// =============================================================================

/// The bridge takes no install parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallBridgeRequest {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallBlockExplorerRequest {
    pub database_username: String,
    pub database_password: String,
    pub coinmarketcap_key: String,
    pub wallet_connect_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallMonitoringRequest {
    pub grafana_password: String,
    #[serde(default)]
    pub alert_manager: AlertManagerConfig,
    #[serde(default)]
    pub logging_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertManagerConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub critical_receivers: Vec<TelegramReceiver>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramReceiver {
    pub chat_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_smarthost: String,
    #[serde(default)]
    pub smtp_from: String,
    #[serde(default)]
    pub smtp_auth_password: String,
    #[serde(default)]
    pub alert_receivers: Vec<String>,
}

/// Parameters of the on-chain candidate registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCandidateRequest {
    pub amount: f64,
    pub memo: String,
    #[serde(default)]
    pub name_info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterMetadataDaoRequest {
    pub username: String,
    pub token: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataInfo {
    #[serde(default)]
    pub chain: ChainInfo,
    #[serde(default)]
    pub bridge: NamedInfo,
    #[serde(default)]
    pub explorer: NamedInfo,
    #[serde(default, rename = "supportResources")]
    pub support: SupportResources,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub website: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedInfo {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportResources {
    #[serde(default)]
    pub status_page_url: String,
    #[serde(default)]
    pub support_contact_url: String,
    #[serde(default)]
    pub documentation_url: String,
    #[serde(default)]
    pub community_url: String,
    #[serde(default)]
    pub help_center_url: String,
    #[serde(default)]
    pub announcement_url: String,
}

/// Install request for any integration type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "kebab-case")]
pub enum InstallRequest {
    Bridge(InstallBridgeRequest),
    BlockExplorer(InstallBlockExplorerRequest),
    Monitoring(InstallMonitoringRequest),
    RegisterCandidate(RegisterCandidateRequest),
    RegisterMetadataDao(RegisterMetadataDaoRequest),
}

impl InstallRequest {
    /// Builds the request for `kind` from an untyped JSON body
    ///
    /// A missing or `null` body is read as an empty object so parameterless
    /// installs need no payload.
    pub fn from_parts(
        kind: IntegrationType,
        params: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let params = if params.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            params
        };

        Ok(match kind {
            IntegrationType::Bridge => InstallRequest::Bridge(serde_json::from_value(params)?),
            IntegrationType::BlockExplorer => {
                InstallRequest::BlockExplorer(serde_json::from_value(params)?)
            }
            IntegrationType::Monitoring => {
                InstallRequest::Monitoring(serde_json::from_value(params)?)
            }
            IntegrationType::RegisterCandidate => {
                InstallRequest::RegisterCandidate(serde_json::from_value(params)?)
            }
            IntegrationType::RegisterMetadataDao => {
                InstallRequest::RegisterMetadataDao(serde_json::from_value(params)?)
            }
        })
    }

    pub fn integration_type(&self) -> IntegrationType {
        match self {
            InstallRequest::Bridge(_) => IntegrationType::Bridge,
            InstallRequest::BlockExplorer(_) => IntegrationType::BlockExplorer,
            InstallRequest::Monitoring(_) => IntegrationType::Monitoring,
            InstallRequest::RegisterCandidate(_) => IntegrationType::RegisterCandidate,
            InstallRequest::RegisterMetadataDao(_) => IntegrationType::RegisterMetadataDao,
        }
    }
}

// =============================================================================
// Post-install Info
// =============================================================================

/// Info of integrations that expose a single endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlInfo {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringInfo {
    pub grafana_url: String,
    pub username: String,
    pub password: String,
}

/// Stored state of the metadata registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDaoRegistration {
    pub config: serde_json::Value,
    pub info: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_request_tagging() {
        let request = InstallRequest::RegisterCandidate(RegisterCandidateRequest {
            amount: 1000.1,
            memo: "memo".to_string(),
            name_info: String::new(),
        });
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "register-candidate");
        assert_eq!(json["params"]["amount"], 1000.1);
    }

    #[test]
    fn test_from_parts_accepts_null_for_bridge() {
        let request =
            InstallRequest::from_parts(IntegrationType::Bridge, serde_json::Value::Null).unwrap();
        assert_eq!(request.integration_type(), IntegrationType::Bridge);
    }

    #[test]
    fn test_from_parts_rejects_missing_fields() {
        let result = InstallRequest::from_parts(
            IntegrationType::BlockExplorer,
            serde_json::json!({ "databaseUsername": "explorer" }),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_metadata_support_key() {
        let info: MetadataInfo = serde_json::from_value(serde_json::json!({
            "supportResources": { "statusPageUrl": "https://status.example" }
        }))
        .unwrap();
        assert_eq!(info.support.status_page_url, "https://status.example");
        assert!(info.chain.description.is_empty());
    }
}
