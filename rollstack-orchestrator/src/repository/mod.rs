//! Repository Module
//!
//! Persistence boundary of the orchestrator. Services only see the traits
//! below; the PostgreSQL backend is used in production and the in-memory
//! backend for tests and local runs.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use std::sync::Arc;

use async_trait::async_trait;
use rollstack_core::domain::UnknownVariant;
use rollstack_core::domain::deployment::{Deployment, DeploymentStatus};
use rollstack_core::domain::integration::{Integration, IntegrationStatus, IntegrationType};
use rollstack_core::domain::log::Log;
use rollstack_core::domain::stack::{Stack, StackMetadata, StackStatus};
use sqlx::PgPool;
use uuid::Uuid;

/// Result type alias using [`RepositoryError`]
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors raised by the persistence layer
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(#[from] UnknownVariant),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid stack transition: cannot transition from {from} to {to}")]
    InvalidTransition { from: StackStatus, to: StackStatus },

    #[error("internal error: {0}")]
    Internal(String),
}

impl RepositoryError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Conflict(_))
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Exclusions applied when listing or bulk-updating integrations
#[derive(Debug, Clone, Default)]
pub struct IntegrationFilter {
    pub except_types: Vec<IntegrationType>,
    pub except_statuses: Vec<IntegrationStatus>,
}

impl IntegrationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn except_type(mut self, kind: IntegrationType) -> Self {
        self.except_types.push(kind);
        self
    }

    #[must_use]
    pub fn except_status(mut self, status: IntegrationStatus) -> Self {
        self.except_statuses.push(status);
        self
    }

    pub fn matches(&self, integration: &Integration) -> bool {
        !self.except_types.contains(&integration.integration_type)
            && !self.except_statuses.contains(&integration.status)
    }

    fn type_names(&self) -> Vec<String> {
        self.except_types
            .iter()
            .map(|t| t.as_str().to_string())
            .collect()
    }

    fn status_names(&self) -> Vec<String> {
        self.except_statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect()
    }
}

// =============================================================================
// Store Traits
// =============================================================================

#[async_trait]
pub trait StackRepository: Send + Sync {
    /// Insert a stack together with its initial deployments and integrations
    ///
    /// Either every row is written or none is.
    async fn create_with_related(
        &self,
        stack: &Stack,
        deployments: &[Deployment],
        integrations: &[Integration],
    ) -> RepositoryResult<()>;

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Stack>>;

    /// Stacks that were not soft-deleted, newest first
    async fn list(&self) -> RepositoryResult<Vec<Stack>>;

    /// Move a stack to `status`
    ///
    /// Fails with `InvalidTransition` when the lifecycle does not allow the
    /// move from the stored status. `reason` is written only when non-empty.
    async fn update_status(
        &self,
        id: Uuid,
        status: StackStatus,
        reason: Option<&str>,
    ) -> RepositoryResult<()>;

    async fn update_metadata(&self, id: Uuid, metadata: &StackMetadata) -> RepositoryResult<()>;

    async fn update_config(&self, id: Uuid, config: &serde_json::Value) -> RepositoryResult<()>;
}

#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    async fn create(&self, deployment: &Deployment) -> RepositoryResult<()>;

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Deployment>>;

    /// Deployments of a stack in creation order, optionally filtered by status
    async fn list_by_stack(
        &self,
        stack_id: Uuid,
        status: Option<DeploymentStatus>,
    ) -> RepositoryResult<Vec<Deployment>>;

    /// Set the run status of one deployment
    ///
    /// Returns `false` without writing when the row is already `Success`
    /// or `Failed`.
    async fn update_status(&self, id: Uuid, status: DeploymentStatus) -> RepositoryResult<bool>;

    /// Set every non-terminal deployment of a stack to `status`
    async fn update_statuses_by_stack(
        &self,
        stack_id: Uuid,
        status: DeploymentStatus,
    ) -> RepositoryResult<u64>;
}

#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    /// Insert an integration
    ///
    /// Fails with `Conflict` when a non-`Terminated` row of the same type
    /// already exists for the stack.
    async fn create(&self, integration: &Integration) -> RepositoryResult<()>;

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Integration>>;

    /// The non-`Terminated` row of a type, if any
    async fn get_active(
        &self,
        stack_id: Uuid,
        kind: IntegrationType,
    ) -> RepositoryResult<Option<Integration>>;

    /// The newest row of a type whose status counts as installed
    async fn get_installed(
        &self,
        stack_id: Uuid,
        kind: IntegrationType,
    ) -> RepositoryResult<Option<Integration>>;

    async fn list_by_stack(
        &self,
        stack_id: Uuid,
        filter: &IntegrationFilter,
    ) -> RepositoryResult<Vec<Integration>>;

    /// A `Terminated` row is never changed, the call is then a no-op
    async fn update_status(
        &self,
        id: Uuid,
        status: IntegrationStatus,
        reason: Option<&str>,
    ) -> RepositoryResult<()>;

    /// Record a successful install: config and info are replaced and the row
    /// becomes `Completed`. Only `Pending` and `InProgress` rows are touched;
    /// returns false when the row had already moved on.
    async fn complete(
        &self,
        id: Uuid,
        config: &serde_json::Value,
        info: &serde_json::Value,
    ) -> RepositoryResult<bool>;

    async fn update_statuses_by_stack(
        &self,
        stack_id: Uuid,
        status: IntegrationStatus,
        filter: &IntegrationFilter,
    ) -> RepositoryResult<u64>;
}

#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Append one row per message, in order
    async fn add_entries(
        &self,
        stack_id: Uuid,
        deployment_id: Uuid,
        messages: &[String],
    ) -> RepositoryResult<u64>;

    /// Forward page over one deployment's logs
    ///
    /// Without a cursor the newest `limit` rows are returned in ascending
    /// order. An unknown cursor is treated as no cursor.
    async fn page_by_deployment(
        &self,
        deployment_id: Uuid,
        limit: u32,
        after: Option<Uuid>,
    ) -> RepositoryResult<Vec<Log>>;

    /// Forward page over every log of a stack
    async fn page_by_stack(
        &self,
        stack_id: Uuid,
        limit: u32,
        after: Option<Uuid>,
    ) -> RepositoryResult<Vec<Log>>;
}

// =============================================================================
// Bundle
// =============================================================================

/// Every store the services need
#[derive(Clone)]
pub struct Repositories {
    pub stacks: Arc<dyn StackRepository>,
    pub deployments: Arc<dyn DeploymentRepository>,
    pub integrations: Arc<dyn IntegrationRepository>,
    pub logs: Arc<dyn LogRepository>,
}

impl Repositories {
    /// Stores backed by a PostgreSQL pool
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PostgresStore::new(pool));
        Self::from_store(store)
    }

    /// Stores held in process memory
    pub fn memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: StackRepository + DeploymentRepository + IntegrationRepository + LogRepository + 'static,
    {
        Self {
            stacks: store.clone(),
            deployments: store.clone(),
            integrations: store.clone(),
            logs: store,
        }
    }
}

/// Statuses a stack may be in right before moving to `next`
fn predecessors(next: StackStatus) -> Vec<String> {
    StackStatus::ALL
        .iter()
        .filter(|s| s.can_transition_to(next))
        .map(|s| s.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predecessors_of_deployed() {
        let from = predecessors(StackStatus::Deployed);
        assert!(from.contains(&"Deploying".to_string()));
        assert!(from.contains(&"Updating".to_string()));
        assert!(from.contains(&"Deployed".to_string()));
        assert!(!from.contains(&"Terminated".to_string()));
    }

    #[test]
    fn test_integration_filter_matches() {
        let filter = IntegrationFilter::new()
            .except_type(IntegrationType::RegisterMetadataDao)
            .except_status(IntegrationStatus::Terminated);

        let mut integration = Integration {
            id: Uuid::new_v4(),
            stack_id: Uuid::new_v4(),
            integration_type: IntegrationType::Bridge,
            status: IntegrationStatus::Completed,
            config: serde_json::Value::Null,
            info: serde_json::Value::Null,
            log_path: String::new(),
            reason: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(filter.matches(&integration));

        integration.status = IntegrationStatus::Terminated;
        assert!(!filter.matches(&integration));

        integration.status = IntegrationStatus::Completed;
        integration.integration_type = IntegrationType::RegisterMetadataDao;
        assert!(!filter.matches(&integration));
    }
}
