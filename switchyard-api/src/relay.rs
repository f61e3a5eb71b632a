//! Inter-program relay engine (spec §4.5): message send with group
//! fan-out and idempotency, inbox reads, TTL/DLQ eviction pumps, and
//! directive/ACK correlation.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::constants::{DEFAULT_MESSAGE_TTL_SECS, DLQ_SWEEP_AGE_SECS, DLQ_SWEEP_BATCH_SIZE, MAX_DELIVERY_ATTEMPTS};
use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::sessions;
use crate::telemetry::METRICS;
use switchyard_core::{
    MessageId, MessageStatus, MessageType, Priority, RelayError, RelayMessage, SessionId, TenantId,
};

/// Fixed in-memory group → member-program-id table. Unknown groups fail
/// validation rather than silently sending nowhere.
static GROUPS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("all", &["orchestrator", "builders", "reviewers"][..]);
    m.insert("builders", &["builder-1", "builder-2"][..]);
    m.insert("reviewers", &["reviewer-1"][..]);
    m
});

/// Every program id that appears as a group member. A target that resolves
/// to neither a group nor one of these is rejected rather than sent as a
/// literal single-recipient address.
static KNOWN_PROGRAMS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| GROUPS.values().flat_map(|members| members.iter().copied()).collect());

fn resolve_targets(target: &str) -> Result<Vec<String>, RelayError> {
    if let Some(members) = GROUPS.get(target) {
        return Ok(members.iter().map(|s| s.to_string()).collect());
    }
    if KNOWN_PROGRAMS.contains(target) {
        return Ok(vec![target.to_string()]);
    }
    Err(RelayError::UnknownGroup(target.to_string()))
}

/// Sends a message, expanding a group target into one row per member
/// sharing a `thread_id`. An idempotency key hit returns the prior message
/// rather than writing again. When `claimant_session_id` is given, a
/// derezzed session is blocked from sending before anything is written.
#[allow(clippy::too_many_arguments)]
pub async fn send_message(
    db: &DbClient,
    tenant_id: TenantId,
    source_program: &str,
    target: &str,
    message_type: MessageType,
    payload: serde_json::Value,
    priority: Priority,
    ttl_secs: Option<i64>,
    idempotency_key: Option<&str>,
    reply_to: Option<MessageId>,
    claimant_session_id: Option<SessionId>,
) -> ApiResult<Vec<RelayMessage>> {
    if let Some(session_id) = claimant_session_id {
        sessions::ensure_not_derezzed(db, session_id, tenant_id).await?;
    }
    if let Some(key) = idempotency_key {
        if let Some(existing) = db.message_find_by_idempotency_key(tenant_id, key).await? {
            return Ok(vec![existing]);
        }
    }

    let is_group = GROUPS.contains_key(target);
    let members = resolve_targets(target)?;
    let ttl = ttl_secs.unwrap_or(DEFAULT_MESSAGE_TTL_SECS);
    let thread_id = if is_group && members.len() > 1 { Some(Uuid::new_v4()) } else { None };

    let mut sent = Vec::with_capacity(members.len());
    for member in &members {
        let message = db
            .message_send(
                tenant_id,
                source_program,
                member,
                message_type,
                payload.clone(),
                priority,
                ttl,
                thread_id,
                // Only the first write of a fan-out carries the idempotency
                // key; the unique index is per (tenant, key), not per member.
                if sent.is_empty() { idempotency_key } else { None },
                reply_to,
            )
            .await?;

        if message_type == MessageType::Directive {
            db.directive_audit_create(message.id, tenant_id).await?;
        }
        if message_type == MessageType::Ack {
            if let Some(directive_id) = reply_to {
                db.directive_audit_acknowledge(directive_id, tenant_id, message.id).await?;
            }
        }

        if let Ok(m) = METRICS.as_ref() {
            m.record_relay_message("sent");
        }
        sent.push(message);
    }
    Ok(sent)
}

pub async fn get_message(db: &DbClient, id: MessageId, tenant_id: TenantId) -> ApiResult<RelayMessage> {
    db.message_get(id, tenant_id).await?.ok_or_else(|| ApiError::message_not_found(id))
}

/// Inbox read. When `mark_as_read` is set, every returned pending/delivered
/// message transitions to `read` with a stamped `read_at`. When
/// `claimant_session_id` is given, a derezzed session cannot read its inbox.
/// Every still-`pending` message surfaced here counts as a delivery attempt,
/// so a recipient that never acks eventually crosses `MAX_DELIVERY_ATTEMPTS`
/// and lands in `sweep_dead_letters` instead of sitting unread forever.
#[allow(clippy::too_many_arguments)]
pub async fn get_messages(
    db: &DbClient,
    tenant_id: TenantId,
    target: &str,
    undelivered_only: bool,
    mark_as_read: bool,
    limit: i64,
    offset: i64,
    claimant_session_id: Option<SessionId>,
) -> ApiResult<Vec<RelayMessage>> {
    if let Some(session_id) = claimant_session_id {
        sessions::ensure_not_derezzed(db, session_id, tenant_id).await?;
    }
    let messages = db.message_list_for_target(tenant_id, target, undelivered_only, limit, offset).await?;
    for message in &messages {
        if message.status == MessageStatus::Pending {
            db.message_increment_attempts(message.id).await?;
        }
    }
    if mark_as_read {
        for message in &messages {
            db.message_mark_read(message.id, tenant_id).await?;
        }
    }
    Ok(messages)
}

pub async fn mark_delivered(db: &DbClient, id: MessageId, tenant_id: TenantId) -> ApiResult<()> {
    db.message_mark_delivered(id, tenant_id).await
}

pub async fn mark_read(db: &DbClient, id: MessageId, tenant_id: TenantId) -> ApiResult<()> {
    db.message_mark_read(id, tenant_id).await
}

/// TTL sweep: pending/delivered rows past their `expires_at` move to
/// `expired`, distinct from attempt-exhausted `dead_letter`. Returns the
/// count swept.
pub async fn sweep_expired(db: &DbClient) -> ApiResult<usize> {
    let expired = db.message_sweep_expired(DLQ_SWEEP_BATCH_SIZE).await?;
    if let Ok(m) = METRICS.as_ref() {
        for _ in 0..expired.len() {
            m.record_relay_message("expired");
        }
    }
    Ok(expired.len())
}

/// Dead-letter sweep: pending rows stuck past [`MAX_DELIVERY_ATTEMPTS`] and
/// older than [`DLQ_SWEEP_AGE_SECS`] move to `dead_letter`.
pub async fn sweep_dead_letters(db: &DbClient) -> ApiResult<usize> {
    let dead = db
        .message_sweep_failed(MAX_DELIVERY_ATTEMPTS, DLQ_SWEEP_AGE_SECS, DLQ_SWEEP_BATCH_SIZE)
        .await?;
    if let Ok(m) = METRICS.as_ref() {
        for _ in 0..dead.len() {
            m.record_relay_message("dead_lettered");
        }
    }
    Ok(dead.len())
}

pub async fn increment_delivery_attempts(db: &DbClient, id: MessageId) -> ApiResult<()> {
    db.message_increment_attempts(id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_group_expands_to_members() {
        let members = resolve_targets("builders").unwrap();
        assert_eq!(members, vec!["builder-1".to_string(), "builder-2".to_string()]);
    }

    #[test]
    fn unregistered_target_is_rejected() {
        let err = resolve_targets("some-program").unwrap_err();
        assert!(matches!(err, RelayError::UnknownGroup(g) if g == "some-program"));
    }

    #[test]
    fn known_program_id_resolves_to_itself() {
        let members = resolve_targets("builder-1").unwrap();
        assert_eq!(members, vec!["builder-1".to_string()]);
    }

    #[test]
    fn all_group_has_three_members() {
        let members = resolve_targets("all").unwrap();
        assert_eq!(members.len(), 3);
    }
}
