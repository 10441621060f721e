//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod deployment;
pub mod error;
pub mod extract;
pub mod file;
pub mod health;
pub mod integration;
pub mod stack;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::Context;

/// Prefix every stack route is mounted under
pub const STACKS_PREFIX: &str = "/api/v1/stacks/thanos";

/// Create the main API router with all endpoints
pub fn create_router(ctx: Context) -> Router {
    let stacks = Router::new()
        // Stack endpoints
        .route("/", post(stack::create_stack).get(stack::list_stacks))
        .route("/{id}", get(stack::get_stack).delete(stack::terminate_stack))
        .route("/{id}/status", get(stack::get_stack_status))
        .route("/{id}/stop", post(stack::stop_stack))
        .route("/{id}/resume", post(stack::resume_stack))
        .route("/{id}/network", put(stack::update_network))
        .route("/{id}/logs", get(stack::get_stack_logs))
        .route("/{id}/rollup-config", get(stack::download_rollup_config))
        // Deployment endpoints
        .route("/{id}/deployments", get(deployment::list_deployments))
        .route("/{id}/deployments/{did}", get(deployment::get_deployment))
        .route(
            "/{id}/deployments/{did}/status",
            get(deployment::get_deployment_status),
        )
        .route(
            "/{id}/deployments/{did}/logs",
            get(deployment::get_deployment_logs),
        )
        .route(
            "/{id}/deployments/{did}/logs/download",
            get(deployment::download_deployment_logs),
        )
        // Integration endpoints
        .route("/{id}/integrations", get(integration::list_integrations))
        .route(
            "/{id}/integrations/register-metadata-dao",
            get(integration::get_metadata_dao)
                .post(integration::install_metadata_dao)
                .delete(integration::uninstall_metadata_dao),
        )
        .route(
            "/{id}/integrations/{integration}",
            get(integration::get_integration)
                .post(integration::install_integration)
                .delete(integration::uninstall_integration),
        );

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .nest(STACKS_PREFIX, stacks)
        // Add state and middleware
        .with_state(ctx)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
