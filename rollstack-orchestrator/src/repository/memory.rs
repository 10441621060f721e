//! In-memory store for tests and local runs.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollstack_core::domain::deployment::{Deployment, DeploymentStatus};
use rollstack_core::domain::integration::{Integration, IntegrationStatus, IntegrationType};
use rollstack_core::domain::log::Log;
use rollstack_core::domain::stack::{Stack, StackMetadata, StackStatus};
use uuid::Uuid;

use super::{
    DeploymentRepository, IntegrationFilter, IntegrationRepository, LogRepository,
    RepositoryError, RepositoryResult, StackRepository,
};

/// In-memory store
///
/// Data is lost when the process exits. All tables sit behind one lock so
/// multi-table writes are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    stacks: HashMap<Uuid, Stack>,
    deployments: HashMap<Uuid, Deployment>,
    integrations: HashMap<Uuid, Integration>,
    /// Insertion order is the (created_at, id) order
    logs: Vec<Log>,
    last_log_at: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| RepositoryError::internal("lock poisoned"))
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| RepositoryError::internal("lock poisoned"))
    }
}

impl Tables {
    fn has_active(&self, stack_id: Uuid, kind: IntegrationType, except: Option<Uuid>) -> bool {
        self.integrations.values().any(|i| {
            i.stack_id == stack_id
                && i.integration_type == kind
                && i.status.is_active()
                && Some(i.id) != except
        })
    }

    fn insert_integration(&mut self, integration: &Integration) -> RepositoryResult<()> {
        if integration.status.is_active()
            && self.has_active(integration.stack_id, integration.integration_type, None)
        {
            return Err(RepositoryError::Conflict(format!(
                "an active {} already exists for stack {}",
                integration.integration_type, integration.stack_id
            )));
        }
        self.integrations
            .insert(integration.id, integration.clone());
        Ok(())
    }

    fn page(&self, owned: impl Fn(&Log) -> bool, limit: u32, after: Option<Uuid>) -> Vec<Log> {
        let limit = limit as usize;
        let scoped: Vec<&Log> = self.logs.iter().filter(|l| owned(l)).collect();

        let start = after.and_then(|cursor| scoped.iter().position(|l| l.id == cursor));

        match start {
            Some(pos) => scoped
                .into_iter()
                .skip(pos + 1)
                .take(limit)
                .cloned()
                .collect(),
            None => {
                let skip = scoped.len().saturating_sub(limit);
                scoped.into_iter().skip(skip).cloned().collect()
            }
        }
    }
}

#[async_trait]
impl StackRepository for MemoryStore {
    async fn create_with_related(
        &self,
        stack: &Stack,
        deployments: &[Deployment],
        integrations: &[Integration],
    ) -> RepositoryResult<()> {
        let mut tables = self.write()?;

        if tables.stacks.contains_key(&stack.id) {
            return Err(RepositoryError::Conflict(format!(
                "stack {} already exists",
                stack.id
            )));
        }

        // Validate everything before touching the tables
        for (n, integration) in integrations.iter().enumerate() {
            let repeated = integrations[..n]
                .iter()
                .any(|i| i.integration_type == integration.integration_type);
            if repeated
                || tables.has_active(integration.stack_id, integration.integration_type, None)
            {
                return Err(RepositoryError::Conflict(format!(
                    "an active {} already exists for stack {}",
                    integration.integration_type, integration.stack_id
                )));
            }
        }

        tables.stacks.insert(stack.id, stack.clone());
        for d in deployments {
            tables.deployments.insert(d.id, d.clone());
        }
        for i in integrations {
            tables.integrations.insert(i.id, i.clone());
        }

        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Stack>> {
        let tables = self.read()?;
        Ok(tables
            .stacks
            .get(&id)
            .filter(|s| s.deleted_at.is_none())
            .cloned())
    }

    async fn list(&self) -> RepositoryResult<Vec<Stack>> {
        let tables = self.read()?;
        let mut stacks: Vec<Stack> = tables
            .stacks
            .values()
            .filter(|s| s.deleted_at.is_none())
            .cloned()
            .collect();
        stacks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(stacks)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: StackStatus,
        reason: Option<&str>,
    ) -> RepositoryResult<()> {
        let mut tables = self.write()?;
        let stack = tables
            .stacks
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound { entity: "stack", id })?;

        if !stack.status.can_transition_to(status) {
            return Err(RepositoryError::InvalidTransition {
                from: stack.status,
                to: status,
            });
        }

        stack.status = status;
        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            stack.reason = Some(reason.to_string());
        }
        stack.updated_at = Utc::now();
        Ok(())
    }

    async fn update_metadata(&self, id: Uuid, metadata: &StackMetadata) -> RepositoryResult<()> {
        let mut tables = self.write()?;
        let stack = tables
            .stacks
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound { entity: "stack", id })?;

        stack.metadata = Some(metadata.clone());
        stack.updated_at = Utc::now();
        Ok(())
    }

    async fn update_config(&self, id: Uuid, config: &serde_json::Value) -> RepositoryResult<()> {
        let mut tables = self.write()?;
        let stack = tables
            .stacks
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound { entity: "stack", id })?;

        stack.config = config.clone();
        stack.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl DeploymentRepository for MemoryStore {
    async fn create(&self, deployment: &Deployment) -> RepositoryResult<()> {
        let mut tables = self.write()?;
        tables.deployments.insert(deployment.id, deployment.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Deployment>> {
        let tables = self.read()?;
        Ok(tables.deployments.get(&id).cloned())
    }

    async fn list_by_stack(
        &self,
        stack_id: Uuid,
        status: Option<DeploymentStatus>,
    ) -> RepositoryResult<Vec<Deployment>> {
        let tables = self.read()?;
        let mut deployments: Vec<Deployment> = tables
            .deployments
            .values()
            .filter(|d| d.stack_id == stack_id)
            .filter(|d| status.is_none_or(|s| d.status == s))
            .cloned()
            .collect();
        deployments.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(deployments)
    }

    async fn update_status(&self, id: Uuid, status: DeploymentStatus) -> RepositoryResult<bool> {
        let mut tables = self.write()?;
        let deployment = tables.deployments.get_mut(&id).ok_or(RepositoryError::NotFound {
            entity: "deployment",
            id,
        })?;

        if deployment.status.is_terminal() {
            return Ok(false);
        }

        let now = Utc::now();
        deployment.status = status;
        deployment.updated_at = now;
        if status == DeploymentStatus::InProgress && deployment.started_at.is_none() {
            deployment.started_at = Some(now);
        }
        if status.is_finished() {
            deployment.finished_at = Some(now);
        }
        Ok(true)
    }

    async fn update_statuses_by_stack(
        &self,
        stack_id: Uuid,
        status: DeploymentStatus,
    ) -> RepositoryResult<u64> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let mut updated = 0;

        for deployment in tables
            .deployments
            .values_mut()
            .filter(|d| d.stack_id == stack_id && !d.status.is_terminal())
        {
            deployment.status = status;
            deployment.updated_at = now;
            if status.is_finished() {
                deployment.finished_at = Some(now);
            }
            updated += 1;
        }
        Ok(updated)
    }
}

#[async_trait]
impl IntegrationRepository for MemoryStore {
    async fn create(&self, integration: &Integration) -> RepositoryResult<()> {
        let mut tables = self.write()?;
        tables.insert_integration(integration)
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Integration>> {
        let tables = self.read()?;
        Ok(tables.integrations.get(&id).cloned())
    }

    async fn get_active(
        &self,
        stack_id: Uuid,
        kind: IntegrationType,
    ) -> RepositoryResult<Option<Integration>> {
        let tables = self.read()?;
        Ok(tables
            .integrations
            .values()
            .find(|i| i.stack_id == stack_id && i.integration_type == kind && i.status.is_active())
            .cloned())
    }

    async fn get_installed(
        &self,
        stack_id: Uuid,
        kind: IntegrationType,
    ) -> RepositoryResult<Option<Integration>> {
        let tables = self.read()?;
        Ok(tables
            .integrations
            .values()
            .filter(|i| {
                i.stack_id == stack_id && i.integration_type == kind && i.status.is_installed()
            })
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn list_by_stack(
        &self,
        stack_id: Uuid,
        filter: &IntegrationFilter,
    ) -> RepositoryResult<Vec<Integration>> {
        let tables = self.read()?;
        let mut integrations: Vec<Integration> = tables
            .integrations
            .values()
            .filter(|i| i.stack_id == stack_id && filter.matches(i))
            .cloned()
            .collect();
        integrations.sort_by_key(|i| i.created_at);
        Ok(integrations)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: IntegrationStatus,
        reason: Option<&str>,
    ) -> RepositoryResult<()> {
        let mut tables = self.write()?;
        let (stack_id, kind, current) = tables
            .integrations
            .get(&id)
            .map(|i| (i.stack_id, i.integration_type, i.status))
            .ok_or(RepositoryError::NotFound {
                entity: "integration",
                id,
            })?;

        if current == IntegrationStatus::Terminated {
            return Ok(());
        }

        if status.is_active() && tables.has_active(stack_id, kind, Some(id)) {
            return Err(RepositoryError::Conflict(format!(
                "integration {id} is already active"
            )));
        }

        if let Some(integration) = tables.integrations.get_mut(&id) {
            integration.status = status;
            if let Some(reason) = reason.filter(|r| !r.is_empty()) {
                integration.reason = Some(reason.to_string());
            }
            integration.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn complete(
        &self,
        id: Uuid,
        config: &serde_json::Value,
        info: &serde_json::Value,
    ) -> RepositoryResult<bool> {
        let mut tables = self.write()?;
        let integration = tables
            .integrations
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound {
                entity: "integration",
                id,
            })?;

        if !matches!(
            integration.status,
            IntegrationStatus::Pending | IntegrationStatus::InProgress
        ) {
            return Ok(false);
        }

        integration.status = IntegrationStatus::Completed;
        integration.config = config.clone();
        integration.info = info.clone();
        integration.reason = None;
        integration.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_statuses_by_stack(
        &self,
        stack_id: Uuid,
        status: IntegrationStatus,
        filter: &IntegrationFilter,
    ) -> RepositoryResult<u64> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let mut updated = 0;

        for integration in tables
            .integrations
            .values_mut()
            .filter(|i| i.stack_id == stack_id && filter.matches(i))
        {
            integration.status = status;
            integration.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }
}

#[async_trait]
impl LogRepository for MemoryStore {
    async fn add_entries(
        &self,
        stack_id: Uuid,
        deployment_id: Uuid,
        messages: &[String],
    ) -> RepositoryResult<u64> {
        let mut tables = self.write()?;

        // Keep created_at monotonic even if the wall clock steps back
        let now = Utc::now();
        let created_at = match tables.last_log_at {
            Some(last) if last > now => last,
            _ => now,
        };
        tables.last_log_at = Some(created_at);

        for message in messages {
            tables.logs.push(Log {
                id: Uuid::now_v7(),
                stack_id,
                deployment_id,
                message: message.clone(),
                created_at,
            });
        }
        Ok(messages.len() as u64)
    }

    async fn page_by_deployment(
        &self,
        deployment_id: Uuid,
        limit: u32,
        after: Option<Uuid>,
    ) -> RepositoryResult<Vec<Log>> {
        let tables = self.read()?;
        Ok(tables.page(|l| l.deployment_id == deployment_id, limit, after))
    }

    async fn page_by_stack(
        &self,
        stack_id: Uuid,
        limit: u32,
        after: Option<Uuid>,
    ) -> RepositoryResult<Vec<Log>> {
        let tables = self.read()?;
        Ok(tables.page(|l| l.stack_id == stack_id, limit, after))
    }
}
