//! Session lifecycle and compliance routes (spec §4.6, §6).

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::capabilities::{require_capability, require_scope, SCOPE_READ, SCOPE_WRITE};
use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthExtractor, RateLimitState};
use crate::routes::ok;
use crate::sessions;
use crate::state::AppState;
use switchyard_core::{BootCheckpoint, SessionId};

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub human_name: Option<String>,
}

async fn create_session(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "session.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "session.write")?;
    let session = sessions::create_session(&db, ctx.tenant_id, &ctx.program_id, req.human_name.as_deref()).await?;
    Ok((rl.into_header_map(), ok(session)))
}

async fn get_session(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<SessionId>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "session.read")?;
    require_scope(&ctx, &[SCOPE_READ, SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "session.read")?;
    let session = sessions::get_session(&db, id, ctx.tenant_id).await?;
    Ok((rl.into_header_map(), ok(session)))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub context_bytes: Option<u64>,
}

async fn heartbeat(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<SessionId>,
    Json(req): Json<HeartbeatRequest>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "session.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "session.write")?;
    sessions::heartbeat(&db, id, ctx.tenant_id, req.context_bytes).await?;
    Ok((rl.into_header_map(), ok(serde_json::json!({ "id": id }))))
}

#[derive(Debug, Deserialize)]
pub struct BootCheckpointRequest {
    pub checkpoint: String,
}

fn parse_checkpoint(s: &str) -> ApiResult<BootCheckpoint> {
    match s {
        "got_program_state" => Ok(BootCheckpoint::GotProgramState),
        "got_tasks" => Ok(BootCheckpoint::GotTasks),
        "got_messages" => Ok(BootCheckpoint::GotMessages),
        other => Err(ApiError::invalid_input(format!(
            "unknown boot checkpoint '{other}', expected one of got_program_state, got_tasks, got_messages"
        ))),
    }
}

async fn record_boot_checkpoint(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<SessionId>,
    Json(req): Json<BootCheckpointRequest>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "session.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "session.write")?;
    let checkpoint = parse_checkpoint(&req.checkpoint)?;
    let session = sessions::record_boot_checkpoint(&db, id, ctx.tenant_id, checkpoint).await?;
    Ok((rl.into_header_map(), ok(session)))
}

async fn activate_journaling(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<SessionId>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "session.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "session.write")?;
    let session = sessions::activate_journaling(&db, id, ctx.tenant_id).await?;
    Ok((rl.into_header_map(), ok(session)))
}

async fn record_tool_call(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<SessionId>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "session.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "session.write")?;
    let session = sessions::record_tool_call(&db, id, ctx.tenant_id).await?;
    Ok((rl.into_header_map(), ok(session)))
}

async fn record_program_state_update(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<SessionId>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "session.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "session.write")?;
    let session = sessions::record_program_state_update(&db, id, ctx.tenant_id).await?;
    Ok((rl.into_header_map(), ok(session)))
}

async fn mark_done(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<SessionId>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "session.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "session.write")?;
    sessions::mark_done(&db, id, ctx.tenant_id).await?;
    Ok((rl.into_header_map(), ok(serde_json::json!({ "id": id }))))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/:id", axum::routing::get(get_session))
        .route("/v1/sessions/:id/heartbeat", post(heartbeat))
        .route("/v1/sessions/:id/boot-checkpoint", post(record_boot_checkpoint))
        .route("/v1/sessions/:id/activate-journaling", post(activate_journaling))
        .route("/v1/sessions/:id/tool-call", post(record_tool_call))
        .route("/v1/sessions/:id/program-state-update", post(record_program_state_update))
        .route("/v1/sessions/:id/done", post(mark_done))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkpoint_valid() {
        assert_eq!(parse_checkpoint("got_program_state").unwrap(), BootCheckpoint::GotProgramState);
        assert_eq!(parse_checkpoint("got_tasks").unwrap(), BootCheckpoint::GotTasks);
        assert_eq!(parse_checkpoint("got_messages").unwrap(), BootCheckpoint::GotMessages);
    }

    #[test]
    fn test_parse_checkpoint_rejects_unknown() {
        assert!(parse_checkpoint("got_vibes").is_err());
        assert!(parse_checkpoint("").is_err());
    }
}
