//! Task dispatch routes (spec §4.4, §6): create/list/claim/unclaim/complete.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::capabilities::{
    require_admin_program_class, require_capability, require_scope, SCOPE_READ, SCOPE_WRITE,
};
use crate::constants::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::db::DbClient;
use crate::dispatch;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthExtractor, RateLimitState};
use crate::routes::ok;
use crate::state::AppState;
use switchyard_core::{
    CompletionOutcome, ErrorClass, Priority, SessionId, TaskId, TaskStatus, TaskType, UnclaimReason,
};

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub instructions: Option<String>,
    pub task_type: TaskType,
    pub target_program: String,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    pub dispatch_action: Option<String>,
    pub idempotency_key: Option<String>,
}

fn default_priority() -> Priority {
    Priority::Normal
}

async fn create_task(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "dispatch.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = state.rate_limit_state.charge_tool_for(&ctx, "dispatch.write")?;
    if req.title.trim().is_empty() {
        return Err(ApiError::missing_field("title"));
    }
    if req.target_program.trim().is_empty() {
        return Err(ApiError::missing_field("target_program"));
    }
    let task = dispatch::create_task(
        &state.db,
        ctx.tenant_id,
        &req.title,
        req.instructions.as_deref(),
        req.task_type,
        &ctx.program_id,
        &req.target_program,
        req.priority,
        req.dispatch_action.as_deref(),
        req.idempotency_key.as_deref(),
    )
    .await?;
    Ok((rl.into_header_map(), ok(task)))
}

#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    pub status: Option<TaskStatus>,
    pub target_program: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

async fn list_tasks(
    State(state): State<AppState>,
    AuthExtractor(ctx): AuthExtractor,
    Query(params): Query<ListTasksParams>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "dispatch.read")?;
    require_scope(&ctx, &[SCOPE_READ, SCOPE_WRITE])?;
    let rl = state.rate_limit_state.charge_tool_for(&ctx, "dispatch.read")?;
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let tasks = dispatch::list_tasks(
        &state.db,
        ctx.tenant_id,
        params.status,
        params.target_program.as_deref(),
        limit,
        params.offset.unwrap_or(0),
    )
    .await?;
    Ok((rl.into_header_map(), ok(tasks)))
}

async fn get_task(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<TaskId>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "dispatch.read")?;
    require_scope(&ctx, &[SCOPE_READ, SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "dispatch.read")?;
    let task = dispatch::get_task(&db, id, ctx.tenant_id).await?;
    Ok((rl.into_header_map(), ok(task)))
}

#[derive(Debug, Deserialize)]
pub struct ClaimTaskRequest {
    pub session_id: SessionId,
}

async fn claim_task(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<TaskId>,
    Json(req): Json<ClaimTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "dispatch.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "dispatch.write")?;
    let task = dispatch::claim_task(&db, id, ctx.tenant_id, req.session_id).await?;
    Ok((rl.into_header_map(), ok(task)))
}

#[derive(Debug, Deserialize)]
pub struct BatchClaimRequest {
    pub target_program: String,
    pub session_id: SessionId,
    #[serde(default = "default_batch_limit")]
    pub limit: i64,
}

fn default_batch_limit() -> i64 {
    10
}

async fn batch_claim_tasks(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Json(req): Json<BatchClaimRequest>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "dispatch.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    require_admin_program_class(&ctx)?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "dispatch.write")?;
    let limit = req.limit.clamp(1, crate::constants::MAX_BATCH_ITEMS as i64);
    let tasks = dispatch::batch_claim_tasks(&db, ctx.tenant_id, &req.target_program, req.session_id, limit).await?;
    Ok((rl.into_header_map(), ok(tasks)))
}

#[derive(Debug, Deserialize)]
pub struct UnclaimTaskRequest {
    pub reason: UnclaimReason,
}

async fn unclaim_task(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<TaskId>,
    Json(req): Json<UnclaimTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "dispatch.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "dispatch.write")?;
    let task = dispatch::unclaim_task(&db, id, ctx.tenant_id, req.reason).await?;
    Ok((rl.into_header_map(), ok(task)))
}

async fn heartbeat_task(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<TaskId>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "dispatch.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "dispatch.write")?;
    dispatch::heartbeat_task(&db, id, ctx.tenant_id).await?;
    Ok((rl.into_header_map(), ok(serde_json::json!({ "id": id }))))
}

#[derive(Debug, Deserialize)]
pub struct CompleteTaskRequest {
    pub outcome: CompletionOutcome,
    pub error_code: Option<String>,
    pub error_class: Option<ErrorClass>,
    pub result_truncated: Option<String>,
    pub tokens_used: Option<i64>,
    pub cost_usd: Option<f64>,
}

async fn complete_task(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<TaskId>,
    Json(req): Json<CompleteTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "dispatch.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "dispatch.write")?;
    let task = dispatch::complete_task(
        &db,
        id,
        ctx.tenant_id,
        req.outcome,
        req.error_code.as_deref(),
        req.error_class,
        req.result_truncated.as_deref(),
        req.tokens_used,
        req.cost_usd,
    )
    .await?;
    Ok((rl.into_header_map(), ok(task)))
}

async fn contention_metrics(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "dispatch.read")?;
    require_scope(&ctx, &[SCOPE_READ, SCOPE_WRITE])?;
    require_admin_program_class(&ctx)?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "dispatch.read")?;
    let metrics = dispatch::get_contention_metrics(&db, ctx.tenant_id).await?;
    Ok((rl.into_header_map(), ok(metrics)))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/v1/tasks", post(create_task).get(list_tasks))
        .route("/v1/tasks/batch-claim", post(batch_claim_tasks))
        .route("/v1/tasks/contention-metrics", get(contention_metrics))
        .route("/v1/tasks/:id", get(get_task))
        .route("/v1/tasks/:id/claim", post(claim_task))
        .route("/v1/tasks/:id/unclaim", post(unclaim_task))
        .route("/v1/tasks/:id/heartbeat", post(heartbeat_task))
        .route("/v1/tasks/:id/complete", post(complete_task))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_priority_is_normal() {
        assert_eq!(default_priority(), Priority::Normal);
    }

    #[test]
    fn test_default_batch_limit() {
        assert_eq!(default_batch_limit(), 10);
    }

    #[test]
    fn test_batch_claim_limit_clamped_to_max() {
        let requested = crate::constants::MAX_BATCH_ITEMS as i64 + 500;
        let clamped = requested.clamp(1, crate::constants::MAX_BATCH_ITEMS as i64);
        assert_eq!(clamped, crate::constants::MAX_BATCH_ITEMS as i64);
    }

    #[test]
    fn test_create_task_request_title_validation() {
        let req = CreateTaskRequest {
            title: "   ".to_string(),
            instructions: None,
            task_type: TaskType::Task,
            target_program: "worker-1".to_string(),
            priority: Priority::Normal,
            dispatch_action: None,
            idempotency_key: None,
        };
        assert!(req.title.trim().is_empty());
    }
}
