//! Stack API Handlers
//!
//! Lifecycle endpoints answer as soon as the work is scheduled. Callers poll
//! the status endpoints to follow it.

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::Response,
};
use rollstack_core::domain::stack::Stack;
use rollstack_core::dto::log::{LogPage, LogQuery};
use rollstack_core::dto::stack::{Accepted, DeployStackRequest, StackStatusView, UpdateNetworkRequest};
use uuid::Uuid;

use crate::api::error::{ApiJson, ApiResult, ok};
use crate::api::extract::ApiPath;
use crate::api::file;
use crate::service::{Context, query, stack};

// =============================================================================
// Lifecycle Endpoints
// =============================================================================

/// POST /
/// Validate and persist a stack, then schedule its deployment
pub async fn create_stack(
    State(ctx): State<Context>,
    payload: Result<Json<DeployStackRequest>, JsonRejection>,
) -> ApiJson<Accepted> {
    let Json(req) = payload?;
    tracing::info!("Creating stack {} on {}", req.chain_name, req.network);
    ok(stack::create_stack(&ctx, req).await?)
}

/// POST /{id}/stop
pub async fn stop_stack(State(ctx): State<Context>, ApiPath(id): ApiPath<Uuid>) -> ApiJson<Accepted> {
    tracing::info!("Stopping stack {}", id);
    ok(stack::stop_stack(&ctx, id).await?)
}

/// POST /{id}/resume
pub async fn resume_stack(State(ctx): State<Context>, ApiPath(id): ApiPath<Uuid>) -> ApiJson<Accepted> {
    tracing::info!("Resuming stack {}", id);
    ok(stack::resume_stack(&ctx, id).await?)
}

/// PUT /{id}/network
pub async fn update_network(
    State(ctx): State<Context>,
    ApiPath(id): ApiPath<Uuid>,
    payload: Result<Json<UpdateNetworkRequest>, JsonRejection>,
) -> ApiJson<Accepted> {
    let Json(req) = payload?;
    tracing::info!("Updating network of stack {}", id);
    ok(stack::update_network(&ctx, id, req).await?)
}

/// DELETE /{id}
pub async fn terminate_stack(
    State(ctx): State<Context>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiJson<Accepted> {
    tracing::info!("Terminating stack {}", id);
    ok(stack::terminate_stack(&ctx, id).await?)
}

// =============================================================================
// Query Endpoints
// =============================================================================

/// GET /
pub async fn list_stacks(State(ctx): State<Context>) -> ApiJson<Vec<Stack>> {
    tracing::debug!("Listing stacks");
    ok(query::list_stacks(&ctx).await?)
}

/// GET /{id}
pub async fn get_stack(State(ctx): State<Context>, ApiPath(id): ApiPath<Uuid>) -> ApiJson<Stack> {
    tracing::debug!("Getting stack: {}", id);
    ok(query::get_stack(&ctx, id).await?)
}

/// GET /{id}/status
pub async fn get_stack_status(
    State(ctx): State<Context>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiJson<StackStatusView> {
    ok(query::get_stack_status(&ctx, id).await?)
}

/// GET /{id}/logs
/// Page through the logs of every deployment of a stack
pub async fn get_stack_logs(
    State(ctx): State<Context>,
    ApiPath(id): ApiPath<Uuid>,
    params: Result<Query<LogQuery>, QueryRejection>,
) -> ApiJson<LogPage> {
    let Query(params) = params?;
    ok(query::stack_logs(&ctx, id, params).await?)
}

/// GET /{id}/rollup-config
/// Download the rollup config written by the deployment
pub async fn download_rollup_config(
    State(ctx): State<Context>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Response> {
    let path = query::rollup_config_file(&ctx, id).await?;
    let short_id: String = id.to_string().chars().take(8).collect();
    file::attachment(&path, &format!("rollup-config_{short_id}.json"), "application/json").await
}
