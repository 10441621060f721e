//! Integration persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollstack_core::domain::integration::{Integration, IntegrationStatus, IntegrationType};
use sqlx::PgConnection;
use uuid::Uuid;

use super::{PostgresStore, map_unique_violation};
use crate::repository::{
    IntegrationFilter, IntegrationRepository, RepositoryError, RepositoryResult,
};

impl PostgresStore {
    async fn exists(&self, id: Uuid) -> RepositoryResult<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM integrations WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }
}

#[async_trait]
impl IntegrationRepository for PostgresStore {
    async fn create(&self, integration: &Integration) -> RepositoryResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_integration(&mut conn, integration).await
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Integration>> {
        let row = sqlx::query_as::<_, IntegrationRow>(
            r#"
            SELECT id, stack_id, type, status, config, info, log_path, reason,
                   created_at, updated_at
            FROM integrations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Integration::try_from).transpose()
    }

    async fn get_active(
        &self,
        stack_id: Uuid,
        kind: IntegrationType,
    ) -> RepositoryResult<Option<Integration>> {
        let row = sqlx::query_as::<_, IntegrationRow>(
            r#"
            SELECT id, stack_id, type, status, config, info, log_path, reason,
                   created_at, updated_at
            FROM integrations
            WHERE stack_id = $1 AND type = $2 AND status <> 'Terminated'
            "#,
        )
        .bind(stack_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Integration::try_from).transpose()
    }

    async fn get_installed(
        &self,
        stack_id: Uuid,
        kind: IntegrationType,
    ) -> RepositoryResult<Option<Integration>> {
        let installed: Vec<String> = IntegrationStatus::INSTALLED
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let row = sqlx::query_as::<_, IntegrationRow>(
            r#"
            SELECT id, stack_id, type, status, config, info, log_path, reason,
                   created_at, updated_at
            FROM integrations
            WHERE stack_id = $1 AND type = $2 AND status = ANY($3)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(stack_id)
        .bind(kind.as_str())
        .bind(installed)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Integration::try_from).transpose()
    }

    async fn list_by_stack(
        &self,
        stack_id: Uuid,
        filter: &IntegrationFilter,
    ) -> RepositoryResult<Vec<Integration>> {
        let rows = sqlx::query_as::<_, IntegrationRow>(
            r#"
            SELECT id, stack_id, type, status, config, info, log_path, reason,
                   created_at, updated_at
            FROM integrations
            WHERE stack_id = $1
              AND NOT (type = ANY($2))
              AND NOT (status = ANY($3))
            ORDER BY created_at ASC
            "#,
        )
        .bind(stack_id)
        .bind(filter.type_names())
        .bind(filter.status_names())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Integration::try_from).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: IntegrationStatus,
        reason: Option<&str>,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE integrations
            SET status = $1, reason = COALESCE(NULLIF($2, ''), reason), updated_at = $3
            WHERE id = $4 AND status <> 'Terminated'
            "#,
        )
        .bind(status.as_str())
        .bind(reason)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, || format!("integration {id} is already active")))?;

        if result.rows_affected() == 0 && !self.exists(id).await? {
            return Err(RepositoryError::NotFound {
                entity: "integration",
                id,
            });
        }
        Ok(())
    }

    async fn complete(
        &self,
        id: Uuid,
        config: &serde_json::Value,
        info: &serde_json::Value,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE integrations
            SET status = 'Completed', config = $1, info = $2, reason = NULL, updated_at = $3
            WHERE id = $4 AND status IN ('Pending', 'InProgress')
            "#,
        )
        .bind(config)
        .bind(info)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if !self.exists(id).await? {
            return Err(RepositoryError::NotFound {
                entity: "integration",
                id,
            });
        }
        Ok(false)
    }

    async fn update_statuses_by_stack(
        &self,
        stack_id: Uuid,
        status: IntegrationStatus,
        filter: &IntegrationFilter,
    ) -> RepositoryResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE integrations
            SET status = $1, updated_at = $2
            WHERE stack_id = $3
              AND NOT (type = ANY($4))
              AND NOT (status = ANY($5))
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(stack_id)
        .bind(filter.type_names())
        .bind(filter.status_names())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

pub(super) async fn insert_integration(
    conn: &mut PgConnection,
    integration: &Integration,
) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO integrations (id, stack_id, type, status, config, info, log_path, reason,
                                  created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(integration.id)
    .bind(integration.stack_id)
    .bind(integration.integration_type.as_str())
    .bind(integration.status.as_str())
    .bind(&integration.config)
    .bind(&integration.info)
    .bind(&integration.log_path)
    .bind(&integration.reason)
    .bind(integration.created_at)
    .bind(integration.updated_at)
    .execute(conn)
    .await
    .map_err(|e| {
        map_unique_violation(e, || {
            format!(
                "an active {} already exists for stack {}",
                integration.integration_type, integration.stack_id
            )
        })
    })?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct IntegrationRow {
    id: Uuid,
    stack_id: Uuid,
    #[sqlx(rename = "type")]
    integration_type: String,
    status: String,
    config: serde_json::Value,
    info: serde_json::Value,
    log_path: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IntegrationRow> for Integration {
    type Error = RepositoryError;

    fn try_from(row: IntegrationRow) -> Result<Self, Self::Error> {
        Ok(Integration {
            id: row.id,
            stack_id: row.stack_id,
            integration_type: row.integration_type.parse()?,
            status: row.status.parse()?,
            config: row.config,
            info: row.info,
            log_path: row.log_path,
            reason: row.reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
