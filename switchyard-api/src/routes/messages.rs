//! Relay messaging routes (spec §4.5, §6): send, inbox read, ack lifecycle.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::capabilities::{require_capability, require_scope, SCOPE_READ, SCOPE_WRITE};
use crate::constants::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthExtractor, RateLimitState};
use crate::relay;
use crate::routes::ok;
use crate::state::AppState;
use switchyard_core::{MessageId, MessageType, Priority, SessionId};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub target: String,
    pub message_type: MessageType,
    pub payload: serde_json::Value,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    pub ttl_secs: Option<i64>,
    pub idempotency_key: Option<String>,
    pub reply_to: Option<MessageId>,
    /// Session claiming to send on the program's behalf. A derezzed session
    /// is blocked before anything is written.
    pub session_id: Option<SessionId>,
}

fn default_priority() -> Priority {
    Priority::Normal
}

async fn send_message(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "relay.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "relay.write")?;
    if req.target.trim().is_empty() {
        return Err(ApiError::missing_field("target"));
    }
    let messages = relay::send_message(
        &db,
        ctx.tenant_id,
        &ctx.program_id,
        &req.target,
        req.message_type,
        req.payload,
        req.priority,
        req.ttl_secs,
        req.idempotency_key.as_deref(),
        req.reply_to,
        req.session_id,
    )
    .await?;
    Ok((rl.into_header_map(), ok(messages)))
}

#[derive(Debug, Deserialize)]
pub struct InboxParams {
    #[serde(default)]
    pub undelivered_only: bool,
    #[serde(default)]
    pub mark_as_read: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Session claiming to read the inbox on the program's behalf.
    pub session_id: Option<SessionId>,
}

async fn get_inbox(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Query(params): Query<InboxParams>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "relay.read")?;
    require_scope(&ctx, &[SCOPE_READ, SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "relay.read")?;
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let messages = relay::get_messages(
        &db,
        ctx.tenant_id,
        &ctx.program_id,
        params.undelivered_only,
        params.mark_as_read,
        limit,
        params.offset.unwrap_or(0),
        params.session_id,
    )
    .await?;
    Ok((rl.into_header_map(), ok(messages)))
}

async fn get_message(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<MessageId>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "relay.read")?;
    require_scope(&ctx, &[SCOPE_READ, SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "relay.read")?;
    let message = relay::get_message(&db, id, ctx.tenant_id).await?;
    Ok((rl.into_header_map(), ok(message)))
}

async fn mark_delivered(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<MessageId>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "relay.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "relay.write")?;
    relay::mark_delivered(&db, id, ctx.tenant_id).await?;
    Ok((rl.into_header_map(), ok(serde_json::json!({ "id": id }))))
}

async fn mark_read(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    AuthExtractor(ctx): AuthExtractor,
    Path(id): Path<MessageId>,
) -> ApiResult<impl IntoResponse> {
    require_capability(&ctx, "relay.write")?;
    require_scope(&ctx, &[SCOPE_WRITE])?;
    let rl = rate_limit_state.charge_tool_for(&ctx, "relay.write")?;
    relay::mark_read(&db, id, ctx.tenant_id).await?;
    Ok((rl.into_header_map(), ok(serde_json::json!({ "id": id }))))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/v1/messages", post(send_message).get(get_inbox))
        .route("/v1/messages/:id", get(get_message))
        .route("/v1/messages/:id/delivered", post(mark_delivered))
        .route("/v1/messages/:id/read", post(mark_read))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_priority_is_normal() {
        assert_eq!(default_priority(), Priority::Normal);
    }

    #[test]
    fn test_send_message_target_validation() {
        let req = SendMessageRequest {
            target: "  ".to_string(),
            message_type: MessageType::Directive,
            payload: serde_json::json!({}),
            priority: Priority::Normal,
            ttl_secs: None,
            idempotency_key: None,
            reply_to: None,
            session_id: None,
        };
        assert!(req.target.trim().is_empty());
    }
}
