use std::sync::Arc;

use anyhow::Context as _;
use rollstack_orchestrator::config::Config;
use rollstack_orchestrator::driver::ProcessDriver;
use rollstack_orchestrator::repository::Repositories;
use rollstack_orchestrator::scheduler::TaskScheduler;
use rollstack_orchestrator::service::Context;
use rollstack_orchestrator::{api, db};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollstack_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rollstack Orchestrator...");

    let config = Config::from_env()?;
    config.validate()?;

    let repos = if config.memory_store {
        tracing::warn!("Using the in-memory store, state is lost on restart");
        Repositories::memory()
    } else {
        tracing::info!("Connecting to database...");
        let pool = db::create_pool(&config.database_url)
            .await
            .context("Failed to create database pool")?;
        db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database ready");
        Repositories::postgres(pool)
    };

    tokio::fs::create_dir_all(&config.storage_root)
        .await
        .with_context(|| format!("Failed to create {}", config.storage_root.display()))?;

    let scheduler = TaskScheduler::new(config.scheduler_workers, config.scheduler_queue_capacity);
    scheduler.start()?;

    let driver = Arc::new(ProcessDriver::new(&config.driver_bin));
    let ctx = Context::new(&config, repos, scheduler.clone(), driver);

    // Build router with all API endpoints
    let app = api::create_router(ctx);

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down, cancelling running tasks");
    scheduler.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
