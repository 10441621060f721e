//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services check preconditions, persist the initial record and hand the
//! long-running part to the task scheduler.

pub mod integration;
pub mod paths;
pub mod query;
pub mod stack;
pub mod transitions;
pub mod validation;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rollstack_core::domain::deployment::{Deployment, DeploymentStatus, DeploymentStep};
use rollstack_core::domain::integration::{Integration, IntegrationStatus, IntegrationType};
use rollstack_core::domain::stack::Stack;
use rollstack_core::dto::stack::DeployStackRequest;
use uuid::Uuid;

use crate::config::Config;
use crate::driver::{AwsCredentials, DriverError, DriverSession, StackDriver};
use crate::ingest::LogTailer;
use crate::repository::{RepositoryError, Repositories};
use crate::scheduler::{SchedulerError, TaskScheduler};

/// Message of every lookup of a missing stack
pub const STACK_NOT_FOUND: &str = "Stack not found";

/// Result type alias using [`ServiceError`]
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error type
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// HTTP status the error is reported with
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::NotFound(_) => 404,
            ServiceError::Unavailable(_) => 503,
            ServiceError::Repository(RepositoryError::InvalidTransition { .. })
            | ServiceError::Repository(RepositoryError::Conflict(_)) => 400,
            ServiceError::Repository(RepositoryError::NotFound { .. }) => 404,
            ServiceError::Repository(_) | ServiceError::Driver(_) | ServiceError::Internal(_) => {
                500
            }
        }
    }

    /// Message safe to hand to API callers
    pub fn public_message(&self) -> String {
        if self.status_code() >= 500 && self.status_code() != 503 {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<SchedulerError> for ServiceError {
    fn from(err: SchedulerError) -> Self {
        ServiceError::Unavailable(err.to_string())
    }
}

/// Shared dependencies of every service
#[derive(Clone)]
pub struct Context {
    pub repos: Repositories,
    pub scheduler: TaskScheduler,
    pub driver: Arc<dyn StackDriver>,
    pub tailer: LogTailer,
    pub storage_root: PathBuf,
}

impl Context {
    pub fn new(
        config: &Config,
        repos: Repositories,
        scheduler: TaskScheduler,
        driver: Arc<dyn StackDriver>,
    ) -> Self {
        let tailer = LogTailer::new(
            repos.logs.clone(),
            config.log_poll_interval,
            config.log_idle_interval,
        );

        Self {
            repos,
            scheduler,
            driver,
            tailer,
            storage_root: config.storage_root.clone(),
        }
    }

    /// Load a stack or fail with "Stack not found"
    pub async fn stack(&self, id: Uuid) -> ServiceResult<Stack> {
        self.repos
            .stacks
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(STACK_NOT_FOUND))
    }

    /// A fresh log file path for one run of `label`
    pub fn log_path(&self, stack_id: Uuid, label: &str) -> PathBuf {
        paths::log_path(&self.storage_root, stack_id, label, Utc::now())
    }

    /// Driver session for one step of `stack`
    ///
    /// AWS credentials come from the stored deploy request. A stack whose
    /// config does not parse gets a session without them.
    pub fn session(&self, stack: &Stack, log_path: &Path) -> DriverSession {
        let request = serde_json::from_value::<DeployStackRequest>(stack.config.clone()).ok();

        DriverSession {
            network: stack.network,
            deployment_path: PathBuf::from(&stack.deployment_path),
            log_path: log_path.to_path_buf(),
            aws: request.as_ref().map(|req| AwsCredentials {
                access_key: req.aws_access_key.clone(),
                secret_access_key: req.aws_secret_access_key.clone(),
                region: req.aws_region.clone(),
            }),
            register_candidate: request.is_some_and(|req| req.register_candidate),
        }
    }
}

// =============================================================================
// Row Builders
// =============================================================================

pub(crate) fn new_deployment(
    stack_id: Uuid,
    step: DeploymentStep,
    status: DeploymentStatus,
    log_path: &Path,
    config: serde_json::Value,
) -> Deployment {
    let now = Utc::now();
    Deployment {
        id: Uuid::new_v4(),
        stack_id,
        step,
        status,
        log_path: log_path.to_string_lossy().into_owned(),
        config,
        created_at: now,
        updated_at: now,
        started_at: (status == DeploymentStatus::InProgress).then_some(now),
        finished_at: None,
    }
}

pub(crate) fn new_integration(
    stack_id: Uuid,
    kind: IntegrationType,
    config: serde_json::Value,
    log_path: &Path,
) -> Integration {
    let now = Utc::now();
    Integration {
        id: Uuid::new_v4(),
        stack_id,
        integration_type: kind,
        status: IntegrationStatus::Pending,
        config,
        info: serde_json::Value::Null,
        log_path: log_path.to_string_lossy().into_owned(),
        reason: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollstack_core::domain::stack::StackStatus;

    #[test]
    fn test_status_codes() {
        assert_eq!(ServiceError::bad_request("x").status_code(), 400);
        assert_eq!(ServiceError::not_found(STACK_NOT_FOUND).status_code(), 404);
        assert_eq!(
            ServiceError::from(SchedulerError::ShuttingDown).status_code(),
            503
        );
        assert_eq!(
            ServiceError::from(RepositoryError::InvalidTransition {
                from: StackStatus::Deployed,
                to: StackStatus::Pending,
            })
            .status_code(),
            400
        );
        assert_eq!(
            ServiceError::from(RepositoryError::internal("lock poisoned")).status_code(),
            500
        );
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let err = ServiceError::from(RepositoryError::internal("lock poisoned"));
        assert_eq!(err.public_message(), "Internal server error");

        let err = ServiceError::from(SchedulerError::QueueFull {
            id: "deploy-stack-1".to_string(),
        });
        assert_eq!(err.public_message(), "task queue is full, rejected deploy-stack-1");

        assert_eq!(
            ServiceError::not_found(STACK_NOT_FOUND).public_message(),
            "Stack not found"
        );
    }
}
