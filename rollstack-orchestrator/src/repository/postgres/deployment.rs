//! Deployment persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollstack_core::domain::deployment::{Deployment, DeploymentStatus};
use sqlx::PgConnection;
use uuid::Uuid;

use super::PostgresStore;
use crate::repository::{DeploymentRepository, RepositoryError, RepositoryResult};

#[async_trait]
impl DeploymentRepository for PostgresStore {
    async fn create(&self, deployment: &Deployment) -> RepositoryResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_deployment(&mut conn, deployment).await
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Deployment>> {
        let row = sqlx::query_as::<_, DeploymentRow>(
            r#"
            SELECT id, stack_id, step, status, log_path, config,
                   created_at, updated_at, started_at, finished_at
            FROM deployments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Deployment::try_from).transpose()
    }

    async fn list_by_stack(
        &self,
        stack_id: Uuid,
        status: Option<DeploymentStatus>,
    ) -> RepositoryResult<Vec<Deployment>> {
        let rows = sqlx::query_as::<_, DeploymentRow>(
            r#"
            SELECT id, stack_id, step, status, log_path, config,
                   created_at, updated_at, started_at, finished_at
            FROM deployments
            WHERE stack_id = $1 AND ($2::VARCHAR IS NULL OR status = $2)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(stack_id)
        .bind(status.map(DeploymentStatus::as_str))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Deployment::try_from).collect()
    }

    async fn update_status(&self, id: Uuid, status: DeploymentStatus) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE deployments
            SET status = $1,
                updated_at = $2,
                started_at = CASE WHEN $3 THEN COALESCE(started_at, $2) ELSE started_at END,
                finished_at = CASE WHEN $4 THEN $2 ELSE finished_at END
            WHERE id = $5 AND status NOT IN ('Success', 'Failed')
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(status == DeploymentStatus::InProgress)
        .bind(status.is_finished())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM deployments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound {
                entity: "deployment",
                id,
            }),
        }
    }

    async fn update_statuses_by_stack(
        &self,
        stack_id: Uuid,
        status: DeploymentStatus,
    ) -> RepositoryResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE deployments
            SET status = $1,
                updated_at = $2,
                finished_at = CASE WHEN $3 THEN $2 ELSE finished_at END
            WHERE stack_id = $4 AND status NOT IN ('Success', 'Failed')
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(status.is_finished())
        .bind(stack_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

pub(super) async fn insert_deployment(
    conn: &mut PgConnection,
    deployment: &Deployment,
) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO deployments (id, stack_id, step, status, log_path, config,
                                 created_at, updated_at, started_at, finished_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(deployment.id)
    .bind(deployment.stack_id)
    .bind(deployment.step.as_str())
    .bind(deployment.status.as_str())
    .bind(&deployment.log_path)
    .bind(&deployment.config)
    .bind(deployment.created_at)
    .bind(deployment.updated_at)
    .bind(deployment.started_at)
    .bind(deployment.finished_at)
    .execute(conn)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct DeploymentRow {
    id: Uuid,
    stack_id: Uuid,
    step: String,
    status: String,
    log_path: String,
    config: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<DeploymentRow> for Deployment {
    type Error = RepositoryError;

    fn try_from(row: DeploymentRow) -> Result<Self, Self::Error> {
        Ok(Deployment {
            id: row.id,
            stack_id: row.stack_id,
            step: row.step.parse()?,
            status: row.status.parse()?,
            log_path: row.log_path,
            config: row.config,
            created_at: row.created_at,
            updated_at: row.updated_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}
