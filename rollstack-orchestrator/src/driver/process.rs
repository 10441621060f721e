//! Driver backed by an external executable
//!
//! Each operation runs `{bin} {operation}` inside the stack's workspace.
//! The session and the operation payload are written to stdin as one JSON
//! document, the JSON result is read from stdout, and stderr is appended to
//! the step's log file where log ingestion picks it up.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use rollstack_core::dto::integration::{
    InstallBlockExplorerRequest, InstallMonitoringRequest, MonitoringInfo,
    RegisterCandidateRequest, RegisterMetadataDaoRequest, UrlInfo,
};
use rollstack_core::dto::stack::{DeployInfraConfig, DeployL1ContractsConfig, UpdateNetworkRequest};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{
    ChainInformation, DriverClient, DriverError, DriverResult, DriverSession, StackDriver,
};

/// Spawns one driver process per operation
#[derive(Debug, Clone)]
pub struct ProcessDriver {
    bin: PathBuf,
}

impl ProcessDriver {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl StackDriver for ProcessDriver {
    async fn connect(&self, session: DriverSession) -> DriverResult<Arc<dyn DriverClient>> {
        tokio::fs::create_dir_all(&session.deployment_path)
            .await
            .map_err(|e| {
                DriverError::Connect(format!(
                    "cannot create workspace {}: {e}",
                    session.deployment_path.display()
                ))
            })?;

        if let Some(parent) = session.log_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DriverError::Connect(format!("cannot create log directory {}: {e}", parent.display()))
            })?;
        }

        Ok(Arc::new(ProcessClient {
            bin: self.bin.clone(),
            session,
        }))
    }
}

struct ProcessClient {
    bin: PathBuf,
    session: DriverSession,
}

#[derive(Serialize)]
struct Request<'a, P: Serialize> {
    session: &'a DriverSession,
    params: P,
}

impl ProcessClient {
    /// Run one operation and decode its stdout
    async fn call<P, R>(&self, operation: &'static str, params: P) -> DriverResult<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_vec(&Request {
            session: &self.session,
            params,
        })?;

        let log_file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.session.log_path)
            .await?
            .into_std()
            .await;

        debug!(
            "Running driver operation {} for {}",
            operation,
            self.session.deployment_path.display()
        );

        let mut child = Command::new(&self.bin)
            .arg(operation)
            .current_dir(&self.session.deployment_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(log_file))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DriverError::operation(
                    operation,
                    format!("failed to start {}: {e}", self.bin.display()),
                )
            })?;

        // A driver may exit without reading its input
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&payload).await {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
                _ => {}
            }
        }

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            return Err(DriverError::operation(
                operation,
                failure_message(&stdout, output.status),
            ));
        }

        let body = stdout.trim();
        let value = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(body)?
        };
        Ok(serde_json::from_value(value)?)
    }
}

/// Error text of a failed run: the `error` field of the JSON output when
/// present, the exit status otherwise
fn failure_message(stdout: &str, status: std::process::ExitStatus) -> String {
    serde_json::from_str::<serde_json::Value>(stdout.trim())
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| format!("driver exited with {status}"))
}

#[async_trait]
impl DriverClient for ProcessClient {
    async fn deploy_l1_contracts(&self, config: &DeployL1ContractsConfig) -> DriverResult<()> {
        self.call::<_, serde_json::Value>("deploy-l1-contracts", config)
            .await
            .map(drop)
    }

    async fn deploy_aws_infrastructure(&self, config: &DeployInfraConfig) -> DriverResult<()> {
        self.call::<_, serde_json::Value>("deploy-aws-infra", config)
            .await
            .map(drop)
    }

    async fn destroy_aws_infrastructure(&self) -> DriverResult<()> {
        self.call::<_, serde_json::Value>("destroy-aws-infra", ())
            .await
            .map(drop)
    }

    async fn show_chain_information(&self) -> DriverResult<ChainInformation> {
        self.call("show-chain-information", ()).await
    }

    async fn update_network(&self, request: &UpdateNetworkRequest) -> DriverResult<()> {
        self.call::<_, serde_json::Value>("update-network", request)
            .await
            .map(drop)
    }

    async fn install_bridge(&self) -> DriverResult<String> {
        let info: UrlInfo = self.call("install-bridge", ()).await?;
        Ok(info.url)
    }

    async fn uninstall_bridge(&self) -> DriverResult<()> {
        self.call::<_, serde_json::Value>("uninstall-bridge", ())
            .await
            .map(drop)
    }

    async fn install_block_explorer(
        &self,
        params: &InstallBlockExplorerRequest,
    ) -> DriverResult<String> {
        let info: UrlInfo = self.call("install-block-explorer", params).await?;
        Ok(info.url)
    }

    async fn uninstall_block_explorer(&self) -> DriverResult<()> {
        self.call::<_, serde_json::Value>("uninstall-block-explorer", ())
            .await
            .map(drop)
    }

    async fn install_monitoring(
        &self,
        params: &InstallMonitoringRequest,
    ) -> DriverResult<MonitoringInfo> {
        self.call("install-monitoring", params).await
    }

    async fn uninstall_monitoring(&self) -> DriverResult<()> {
        self.call::<_, serde_json::Value>("uninstall-monitoring", ())
            .await
            .map(drop)
    }

    async fn verify_register_candidates(
        &self,
        params: &RegisterCandidateRequest,
    ) -> DriverResult<()> {
        self.call::<_, serde_json::Value>("verify-register-candidates", params)
            .await
            .map(drop)
    }

    async fn register_candidate_info(
        &self,
        params: &RegisterCandidateRequest,
    ) -> DriverResult<serde_json::Value> {
        self.call("register-candidate-info", params).await
    }

    async fn register_metadata_dao(
        &self,
        params: &RegisterMetadataDaoRequest,
    ) -> DriverResult<serde_json::Value> {
        self.call("register-metadata-dao", params).await
    }
}
