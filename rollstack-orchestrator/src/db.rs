use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create stacks table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stacks (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            type VARCHAR(50) NOT NULL,
            network VARCHAR(50) NOT NULL,
            config JSONB NOT NULL DEFAULT '{}',
            deployment_path TEXT NOT NULL,
            metadata JSONB,
            status VARCHAR(50) NOT NULL,
            reason TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            deleted_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create deployments table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS deployments (
            id UUID PRIMARY KEY,
            stack_id UUID NOT NULL REFERENCES stacks(id) ON DELETE CASCADE,
            step VARCHAR(50) NOT NULL,
            status VARCHAR(50) NOT NULL,
            log_path TEXT NOT NULL,
            config JSONB NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            started_at TIMESTAMPTZ,
            finished_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create integrations table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS integrations (
            id UUID PRIMARY KEY,
            stack_id UUID NOT NULL REFERENCES stacks(id) ON DELETE CASCADE,
            type VARCHAR(50) NOT NULL,
            status VARCHAR(50) NOT NULL,
            config JSONB NOT NULL DEFAULT '{}',
            info JSONB NOT NULL DEFAULT '{}',
            log_path TEXT NOT NULL,
            reason TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create logs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS logs (
            id UUID PRIMARY KEY,
            stack_id UUID NOT NULL REFERENCES stacks(id) ON DELETE CASCADE,
            deployment_id UUID NOT NULL REFERENCES deployments(id) ON DELETE CASCADE,
            message TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_stacks_status ON stacks(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_deployments_stack_id ON deployments(stack_id, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_integrations_stack_id ON integrations(stack_id)")
        .execute(pool)
        .await?;

    // At most one live integration of each type per stack
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_integrations_active_type
        ON integrations(stack_id, type)
        WHERE status <> 'Terminated'
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_logs_deployment_id ON logs(deployment_id, created_at, id)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_logs_stack_id ON logs(stack_id, created_at, id)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
