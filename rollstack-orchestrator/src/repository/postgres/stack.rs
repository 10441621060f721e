//! Stack persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollstack_core::domain::deployment::Deployment;
use rollstack_core::domain::integration::Integration;
use rollstack_core::domain::stack::{Stack, StackMetadata, StackStatus};
use sqlx::PgConnection;
use uuid::Uuid;

use super::{PostgresStore, deployment, integration};
use crate::repository::{RepositoryError, RepositoryResult, StackRepository, predecessors};

#[async_trait]
impl StackRepository for PostgresStore {
    async fn create_with_related(
        &self,
        stack: &Stack,
        deployments: &[Deployment],
        integrations: &[Integration],
    ) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;

        insert_stack(&mut tx, stack).await?;
        for d in deployments {
            deployment::insert_deployment(&mut tx, d).await?;
        }
        for i in integrations {
            integration::insert_integration(&mut tx, i).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Stack>> {
        let row = sqlx::query_as::<_, StackRow>(
            r#"
            SELECT id, name, type, network, config, deployment_path, metadata,
                   status, reason, created_at, updated_at, deleted_at
            FROM stacks
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Stack::try_from).transpose()
    }

    async fn list(&self) -> RepositoryResult<Vec<Stack>> {
        let rows = sqlx::query_as::<_, StackRow>(
            r#"
            SELECT id, name, type, network, config, deployment_path, metadata,
                   status, reason, created_at, updated_at, deleted_at
            FROM stacks
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Stack::try_from).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: StackStatus,
        reason: Option<&str>,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stacks
            SET status = $1, reason = COALESCE(NULLIF($2, ''), reason), updated_at = $3
            WHERE id = $4 AND status = ANY($5)
            "#,
        )
        .bind(status.as_str())
        .bind(reason)
        .bind(Utc::now())
        .bind(id)
        .bind(predecessors(status))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Nothing matched: either the stack is gone or the move is illegal
        let current: Option<String> = sqlx::query_scalar("SELECT status FROM stacks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match current {
            None => Err(RepositoryError::NotFound { entity: "stack", id }),
            Some(from) => Err(RepositoryError::InvalidTransition {
                from: from.parse()?,
                to: status,
            }),
        }
    }

    async fn update_metadata(&self, id: Uuid, metadata: &StackMetadata) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stacks
            SET metadata = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(serde_json::to_value(metadata)?)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "stack", id });
        }
        Ok(())
    }

    async fn update_config(&self, id: Uuid, config: &serde_json::Value) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stacks
            SET config = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(config)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "stack", id });
        }
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

async fn insert_stack(conn: &mut PgConnection, stack: &Stack) -> RepositoryResult<()> {
    let metadata = stack
        .metadata
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO stacks (id, name, type, network, config, deployment_path, metadata,
                            status, reason, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(stack.id)
    .bind(&stack.name)
    .bind(stack.stack_type.as_str())
    .bind(stack.network.as_str())
    .bind(&stack.config)
    .bind(&stack.deployment_path)
    .bind(metadata)
    .bind(stack.status.as_str())
    .bind(&stack.reason)
    .bind(stack.created_at)
    .bind(stack.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct StackRow {
    id: Uuid,
    name: String,
    #[sqlx(rename = "type")]
    stack_type: String,
    network: String,
    config: serde_json::Value,
    deployment_path: String,
    metadata: Option<serde_json::Value>,
    status: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<StackRow> for Stack {
    type Error = RepositoryError;

    fn try_from(row: StackRow) -> Result<Self, Self::Error> {
        Ok(Stack {
            id: row.id,
            name: row.name,
            stack_type: row.stack_type.parse()?,
            network: row.network.parse()?,
            config: row.config,
            deployment_path: row.deployment_path,
            metadata: row.metadata.map(serde_json::from_value).transpose()?,
            status: row.status.parse()?,
            reason: row.reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}
