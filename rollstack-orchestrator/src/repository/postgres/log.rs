//! Log persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollstack_core::domain::log::Log;
use uuid::Uuid;

use super::PostgresStore;
use crate::repository::{LogRepository, RepositoryResult};

/// Column a log page is scoped by
#[derive(Clone, Copy)]
enum Scope {
    Deployment,
    Stack,
}

impl Scope {
    fn column(self) -> &'static str {
        match self {
            Scope::Deployment => "deployment_id",
            Scope::Stack => "stack_id",
        }
    }
}

#[async_trait]
impl LogRepository for PostgresStore {
    async fn add_entries(
        &self,
        stack_id: Uuid,
        deployment_id: Uuid,
        messages: &[String],
    ) -> RepositoryResult<u64> {
        if messages.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let ids: Vec<Uuid> = messages.iter().map(|_| Uuid::now_v7()).collect();
        let created: Vec<DateTime<Utc>> = vec![now; messages.len()];

        let result = sqlx::query(
            r#"
            INSERT INTO logs (id, stack_id, deployment_id, message, created_at)
            SELECT entry.id, $1, $2, entry.message, entry.created_at
            FROM UNNEST($3::UUID[], $4::TEXT[], $5::TIMESTAMPTZ[])
                AS entry(id, message, created_at)
            "#,
        )
        .bind(stack_id)
        .bind(deployment_id)
        .bind(ids)
        .bind(messages)
        .bind(created)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn page_by_deployment(
        &self,
        deployment_id: Uuid,
        limit: u32,
        after: Option<Uuid>,
    ) -> RepositoryResult<Vec<Log>> {
        self.page(Scope::Deployment, deployment_id, limit, after)
            .await
    }

    async fn page_by_stack(
        &self,
        stack_id: Uuid,
        limit: u32,
        after: Option<Uuid>,
    ) -> RepositoryResult<Vec<Log>> {
        self.page(Scope::Stack, stack_id, limit, after).await
    }
}

impl PostgresStore {
    async fn page(
        &self,
        scope: Scope,
        owner: Uuid,
        limit: u32,
        after: Option<Uuid>,
    ) -> RepositoryResult<Vec<Log>> {
        let column = scope.column();
        let limit = i64::from(limit);

        let cursor = match after {
            Some(after) => sqlx::query_as::<_, (DateTime<Utc>, Uuid)>(&format!(
                "SELECT created_at, id FROM logs WHERE id = $1 AND {column} = $2"
            ))
            .bind(after)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?,
            None => None,
        };

        let rows = match cursor {
            Some((created_at, id)) => {
                sqlx::query_as::<_, LogRow>(&format!(
                    r#"
                    SELECT id, stack_id, deployment_id, message, created_at
                    FROM logs
                    WHERE {column} = $1 AND (created_at, id) > ($2, $3)
                    ORDER BY created_at ASC, id ASC
                    LIMIT $4
                    "#
                ))
                .bind(owner)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                let mut rows = sqlx::query_as::<_, LogRow>(&format!(
                    r#"
                    SELECT id, stack_id, deployment_id, message, created_at
                    FROM logs
                    WHERE {column} = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                    "#
                ))
                .bind(owner)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
                rows.reverse();
                rows
            }
        };

        Ok(rows.into_iter().map(Log::from).collect())
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    stack_id: Uuid,
    deployment_id: Uuid,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<LogRow> for Log {
    fn from(row: LogRow) -> Self {
        Log {
            id: row.id,
            stack_id: row.stack_id,
            deployment_id: row.deployment_id,
            message: row.message,
            created_at: row.created_at,
        }
    }
}
