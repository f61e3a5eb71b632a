//! Session lifecycle and the compliance state machine glue (spec §4.6).
//!
//! The state machine itself lives in `switchyard_core::compliance` as a
//! pure `(record, event) -> record` function; this module is the
//! persistence-aware wrapper routes and the auth middleware call into.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::SESSION_TIMEOUT_SECS;
use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use switchyard_core::{
    apply_compliance_event, BootCheckpoint, ComplianceEvent, ComplianceState, Session, SessionId,
    TenantId,
};

/// `{program}[-{env}].{task}` — e.g. `builder-prod.write-docs`.
static SESSION_IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+(-[a-zA-Z0-9_]+)?\.[a-zA-Z0-9_]+$").expect("static regex"));

/// Checks a human-facing session identifier against `{program}[-{env}].{task}`.
/// Legacy identifiers that don't match are logged and accepted rather than
/// rejected, so older integrations keep working while new ones converge on
/// the format.
fn check_session_identifier_format(human_name: &str) {
    if !SESSION_IDENTIFIER_RE.is_match(human_name) {
        tracing::warn!(human_name, "session identifier does not match {{program}}[-{{env}}].{{task}} format");
    }
}

pub async fn create_session(
    db: &DbClient,
    tenant_id: TenantId,
    program_id: &str,
    human_name: Option<&str>,
) -> ApiResult<Session> {
    if let Some(name) = human_name {
        check_session_identifier_format(name);
    }
    db.session_create(tenant_id, program_id, human_name).await
}

pub async fn get_session(db: &DbClient, id: SessionId, tenant_id: TenantId) -> ApiResult<Session> {
    db.session_get(id, tenant_id).await?.ok_or_else(|| ApiError::session_not_found(id))
}

/// Heartbeats a session and appends a context-byte sample, recomputing the
/// rolling `context_percent`.
pub async fn heartbeat(
    db: &DbClient,
    id: SessionId,
    tenant_id: TenantId,
    context_bytes: Option<u64>,
) -> ApiResult<()> {
    let mut session = get_session(db, id, tenant_id).await?;
    if let Some(bytes) = context_bytes {
        session.push_context_sample(bytes);
    }
    if db.session_heartbeat(id, tenant_id, session.context_bytes_total).await? {
        Ok(())
    } else {
        Err(ApiError::session_not_found(id))
    }
}

/// Blocks on a terminal `DEREZED` session. Call this from any dispatch or
/// relay operation that transacts on behalf of a session before mutating
/// anything, mirroring the check `apply_event` runs for session routes.
pub async fn ensure_not_derezzed(db: &DbClient, id: SessionId, tenant_id: TenantId) -> ApiResult<()> {
    let session = get_session(db, id, tenant_id).await?;
    if session.compliance.state == ComplianceState::Derezzed {
        return Err(ApiError::compliance_blocked(format!("Session {id} has been derezzed")));
    }
    Ok(())
}

/// Drives a compliance event through the pure transition function and
/// persists the result. Returns `ComplianceError::SessionTerminated` (via
/// `ApiError::compliance_blocked`) if the session is already `DEREZED`.
pub async fn apply_event(
    db: &DbClient,
    id: SessionId,
    tenant_id: TenantId,
    event: ComplianceEvent,
) -> ApiResult<Session> {
    let session = get_session(db, id, tenant_id).await?;
    if session.compliance.state == ComplianceState::Derezzed {
        return Err(ApiError::compliance_blocked(format!("Session {id} has been derezzed")));
    }
    let updated_record = apply_compliance_event(session.compliance.clone(), event);
    db.session_update_compliance(id, tenant_id, &updated_record).await?;
    get_session(db, id, tenant_id).await
}

pub async fn record_boot_checkpoint(
    db: &DbClient,
    id: SessionId,
    tenant_id: TenantId,
    checkpoint: BootCheckpoint,
) -> ApiResult<Session> {
    apply_event(db, id, tenant_id, ComplianceEvent::BootCheckpoint(checkpoint)).await
}

/// Activates journaling (called once a session wins its first task claim).
pub async fn activate_journaling(db: &DbClient, id: SessionId, tenant_id: TenantId) -> ApiResult<Session> {
    apply_event(db, id, tenant_id, ComplianceEvent::JournalingActivated).await
}

/// Records a non-exempt tool call against the journal counter, escalating
/// the compliance state if the session has crossed a warn threshold.
pub async fn record_tool_call(db: &DbClient, id: SessionId, tenant_id: TenantId) -> ApiResult<Session> {
    apply_event(db, id, tenant_id, ComplianceEvent::NonExemptToolCall).await
}

/// Resets the journal counter and restores `COMPLIANT` when journaling is
/// active.
pub async fn record_program_state_update(db: &DbClient, id: SessionId, tenant_id: TenantId) -> ApiResult<Session> {
    apply_event(db, id, tenant_id, ComplianceEvent::ProgramStateUpdated).await
}

pub async fn mark_done(db: &DbClient, id: SessionId, tenant_id: TenantId) -> ApiResult<()> {
    db.session_mark_done(id, tenant_id).await
}

/// Background sweep: sessions idle past [`SESSION_TIMEOUT_SECS`] are marked
/// `done` and archived. Returns the count swept.
pub async fn cleanup_expired(db: &DbClient) -> ApiResult<usize> {
    let n = db.session_cleanup_expired(SESSION_TIMEOUT_SECS).await?;
    Ok(n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_identifier_matches() {
        assert!(SESSION_IDENTIFIER_RE.is_match("builder.write-docs"));
        assert!(SESSION_IDENTIFIER_RE.is_match("builder-prod.write-docs"));
    }

    #[test]
    fn identifier_missing_task_segment_does_not_match() {
        assert!(!SESSION_IDENTIFIER_RE.is_match("builder-prod"));
    }

    #[test]
    fn legacy_identifier_check_does_not_panic() {
        check_session_identifier_format("not-a-valid-session-id");
    }
}
