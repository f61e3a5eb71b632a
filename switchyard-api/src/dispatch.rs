//! Task dispatch engine (spec §4.4).
//!
//! Claiming is a compare-and-swap at the SQL layer (`db::task_claim`); this
//! module adds the business rules around it: claim-event logging, the
//! unclaim circuit breaker, and contention/orphan bookkeeping that routes
//! and the background cleanup job call into.

use crate::constants::{ORPHAN_THRESHOLD_SECS, UNCLAIM_CIRCUIT_BREAKER_THRESHOLD};
use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::telemetry::METRICS;
use switchyard_core::{
    ClaimOutcome, CompletionOutcome, ErrorClass, Priority, SessionId, Task, TaskId, TaskStatus,
    TaskType, TenantId, UnclaimReason,
};

#[allow(clippy::too_many_arguments)]
pub async fn create_task(
    db: &DbClient,
    tenant_id: TenantId,
    title: &str,
    instructions: Option<&str>,
    task_type: TaskType,
    source_program: &str,
    target_program: &str,
    priority: Priority,
    dispatch_action: Option<&str>,
    idempotency_key: Option<&str>,
) -> ApiResult<Task> {
    db.task_create(
        tenant_id,
        title,
        instructions,
        task_type,
        source_program,
        target_program,
        priority,
        dispatch_action,
        idempotency_key,
    )
    .await
}

pub async fn get_task(db: &DbClient, id: TaskId, tenant_id: TenantId) -> ApiResult<Task> {
    db.task_get(id, tenant_id).await?.ok_or_else(|| ApiError::task_not_found(id))
}

pub async fn list_tasks(
    db: &DbClient,
    tenant_id: TenantId,
    status: Option<TaskStatus>,
    target_program: Option<&str>,
    limit: i64,
    offset: i64,
) -> ApiResult<Vec<Task>> {
    db.task_list(tenant_id, status, target_program, limit, offset).await
}

/// Claims a single task. Losing the race is not an error: it records a
/// `contention` claim event and returns `ApiError::not_claimable`.
pub async fn claim_task(
    db: &DbClient,
    id: TaskId,
    tenant_id: TenantId,
    claimant_session_id: SessionId,
) -> ApiResult<Task> {
    crate::sessions::ensure_not_derezzed(db, claimant_session_id, tenant_id).await?;
    match db.task_claim(id, tenant_id, claimant_session_id).await? {
        Some(task) => {
            db.claim_event_insert(tenant_id, id, claimant_session_id, ClaimOutcome::Claimed)
                .await?;
            if let Ok(m) = METRICS.as_ref() {
                m.record_task_claim("won");
            }
            Ok(task)
        }
        None => {
            db.claim_event_insert(tenant_id, id, claimant_session_id, ClaimOutcome::Contention)
                .await?;
            if let Ok(m) = METRICS.as_ref() {
                m.record_task_claim("lost");
            }
            let current = db.task_get(id, tenant_id).await?.ok_or_else(|| ApiError::task_not_found(id))?;
            Err(ApiError::not_claimable(current.status.to_string()))
        }
    }
}

/// Batch claim is not all-or-nothing: it returns whichever subset of up to
/// `limit` tasks actually won, which may be fewer than `limit` or none.
pub async fn batch_claim_tasks(
    db: &DbClient,
    tenant_id: TenantId,
    target_program: &str,
    claimant_session_id: SessionId,
    limit: i64,
) -> ApiResult<Vec<Task>> {
    crate::sessions::ensure_not_derezzed(db, claimant_session_id, tenant_id).await?;
    let claimed = db.task_batch_claim(tenant_id, target_program, claimant_session_id, limit).await?;
    for task in &claimed {
        db.claim_event_insert(tenant_id, task.id, claimant_session_id, ClaimOutcome::Claimed)
            .await?;
    }
    if let Ok(m) = METRICS.as_ref() {
        for _ in 0..claimed.len() {
            m.record_task_claim("won");
        }
    }
    Ok(claimed)
}

/// Checks the compliance state of whichever session currently holds the
/// task's claim, if any. Tasks that were never claimed have no session to
/// check against.
async fn ensure_claimant_not_derezzed(db: &DbClient, id: TaskId, tenant_id: TenantId) -> ApiResult<()> {
    if let Some(task) = db.task_get(id, tenant_id).await? {
        if let Some(session_id) = task.claimant_session_id {
            crate::sessions::ensure_not_derezzed(db, session_id, tenant_id).await?;
        }
    }
    Ok(())
}

/// Whether unclaiming a task with `prior_count` prior unclaims trips the
/// circuit breaker, mirroring the `(unclaim_count + 1) >= threshold`
/// arithmetic `task_unclaim`'s SQL does atomically, and the count it leaves
/// behind.
pub(crate) fn unclaim_flags(prior_count: i32, threshold: i32) -> (i32, bool) {
    let new_count = prior_count.saturating_add(1);
    (new_count, new_count >= threshold)
}

pub async fn unclaim_task(
    db: &DbClient,
    id: TaskId,
    tenant_id: TenantId,
    reason: UnclaimReason,
) -> ApiResult<Task> {
    ensure_claimant_not_derezzed(db, id, tenant_id).await?;
    let prior = db.task_get(id, tenant_id).await?.map(|t| t.unclaim_count).unwrap_or(0);
    let task = db
        .task_unclaim(id, tenant_id, reason, UNCLAIM_CIRCUIT_BREAKER_THRESHOLD)
        .await?
        .ok_or_else(|| ApiError::not_active(id))?;
    let (_, should_be_flagged) = unclaim_flags(prior, UNCLAIM_CIRCUIT_BREAKER_THRESHOLD);
    if should_be_flagged && task.flagged {
        tracing::warn!(task_id = %id, unclaim_count = task.unclaim_count, "task tripped unclaim circuit breaker");
    }
    Ok(task)
}

pub async fn heartbeat_task(db: &DbClient, id: TaskId, tenant_id: TenantId) -> ApiResult<()> {
    ensure_claimant_not_derezzed(db, id, tenant_id).await?;
    if db.task_heartbeat(id, tenant_id).await? {
        Ok(())
    } else {
        Err(ApiError::not_active(id))
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn complete_task(
    db: &DbClient,
    id: TaskId,
    tenant_id: TenantId,
    outcome: CompletionOutcome,
    error_code: Option<&str>,
    error_class: Option<ErrorClass>,
    result_truncated: Option<&str>,
    tokens_used: Option<i64>,
    cost_usd: Option<f64>,
) -> ApiResult<Task> {
    ensure_claimant_not_derezzed(db, id, tenant_id).await?;
    db.task_complete(
        id,
        tenant_id,
        outcome,
        error_code,
        error_class,
        result_truncated,
        tokens_used,
        cost_usd,
    )
    .await?
    .ok_or_else(|| ApiError::not_active(id))
}

/// Background orphan sweep: unclaims tasks whose claimant's heartbeat has
/// gone stale past [`ORPHAN_THRESHOLD_SECS`]. Returns the count swept.
pub async fn sweep_orphans(db: &DbClient) -> ApiResult<usize> {
    let swept = db
        .task_sweep_orphans(ORPHAN_THRESHOLD_SECS, UNCLAIM_CIRCUIT_BREAKER_THRESHOLD)
        .await?;
    Ok(swept.len())
}

/// Claim attempts vs wins for the contention-rate metrics endpoint (spec
/// §4.4, §6; testable property #1).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContentionMetrics {
    pub claims_attempted: i64,
    pub claims_won: i64,
    pub contention_rate: f64,
}

pub async fn get_contention_metrics(db: &DbClient, tenant_id: TenantId) -> ApiResult<ContentionMetrics> {
    let (claimed, contention) = db.task_contention_metrics(tenant_id).await?;
    let claims_attempted = claimed + contention;
    let contention_rate = if claims_attempted > 0 {
        (contention as f64 / claims_attempted as f64) * 100.0
    } else {
        0.0
    };
    Ok(ContentionMetrics { claims_attempted, claims_won: claimed, contention_rate })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest::proptest! {
        #[test]
        fn unclaim_flags_trips_exactly_at_threshold(
            prior_count in 0i32..10_000,
            threshold in 1i32..20,
        ) {
            let (new_count, flagged) = unclaim_flags(prior_count, threshold);
            proptest::prop_assert_eq!(new_count, prior_count + 1);
            proptest::prop_assert_eq!(flagged, new_count >= threshold);
        }
    }

    #[test]
    fn orphan_threshold_matches_flag_threshold_constants() {
        assert!(ORPHAN_THRESHOLD_SECS > 0);
        assert!(UNCLAIM_CIRCUIT_BREAKER_THRESHOLD > 0);
    }
}
