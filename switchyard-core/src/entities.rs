//! Typed entity structs. Pure data, no behavior.

use crate::enums::*;
use crate::identity::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of entries retained in a session's rolling context history.
pub const CONTEXT_HISTORY_CAP: usize = 1_000;

/// Fixed context window size used to compute `contextPercent`.
pub const CONTEXT_WINDOW_BYTES: u64 = 200_000;

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub display_name: String,
    pub created_at: Timestamp,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: ApiKeyId,
    /// Hex SHA-256 digest of the opaque key; the primary lookup key.
    pub key_hash: SecretDigest,
    pub tenant_id: TenantId,
    pub program_id: String,
    pub capabilities: Vec<String>,
    pub active: bool,
    pub revoked_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub rate_limit_tier: RateLimitTier,
    pub last_used_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClient {
    pub id: OAuthClientId,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: OAuthClientAuthMethod,
    pub client_secret_hash: Option<SecretDigest>,
    pub tenant_id: Option<TenantId>,
    pub created_at: Timestamp,
    pub last_used_at: Option<Timestamp>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub id: PendingAuthId,
    pub client_id: OAuthClientId,
    pub redirect_uri: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub state: String,
    pub scope: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// Hex SHA-256 digest of the 32-byte code; the primary lookup key.
    pub code_hash: SecretDigest,
    pub client_id: OAuthClientId,
    pub user_id: TenantId,
    pub redirect_uri: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub state: String,
    pub scope: String,
    pub used: bool,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokenRecord {
    pub id: OAuthTokenId,
    /// Hex SHA-256 digest of the token; the primary lookup key.
    pub token_hash: SecretDigest,
    pub kind: OAuthTokenKind,
    pub tenant_id: TenantId,
    pub client_id: OAuthClientId,
    pub scope: String,
    pub family_id: uuid::Uuid,
    pub parent_hash: Option<SecretDigest>,
    pub active: bool,
    pub expires_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub tenant_id: TenantId,
    pub title: String,
    pub instructions: Option<String>,
    pub task_type: TaskType,
    pub source_program: String,
    pub target_program: String,
    pub priority: Priority,
    pub dispatch_action: Option<String>,
    pub status: TaskStatus,
    pub completion_outcome: Option<CompletionOutcome>,
    pub error_code: Option<String>,
    pub error_class: Option<ErrorClass>,
    pub result_truncated: Option<String>,
    pub tokens_used: Option<i64>,
    pub cost_usd: Option<f64>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub claimant_session_id: Option<SessionId>,
    pub last_heartbeat: Option<Timestamp>,
    pub unclaim_count: i32,
    pub last_unclaim_reason: Option<UnclaimReason>,
    pub flagged: bool,
    pub requires_action: bool,
    pub expires_at: Option<Timestamp>,
    pub idempotency_key: Option<String>,
    pub external_tracker_ref: Option<String>,
    pub expiry_reason: Option<String>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimEvent {
    pub id: ClaimEventId,
    pub tenant_id: TenantId,
    pub task_id: TaskId,
    pub session_id: SessionId,
    pub outcome: ClaimOutcome,
    pub occurred_at: Timestamp,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayMessage {
    pub id: MessageId,
    pub tenant_id: TenantId,
    pub source_program: String,
    pub target: String,
    pub message_type: MessageType,
    pub payload: serde_json::Value,
    pub priority: Priority,
    pub status: MessageStatus,
    pub delivery_attempts: i32,
    pub created_at: Timestamp,
    pub delivered_at: Option<Timestamp>,
    pub read_at: Option<Timestamp>,
    pub expires_at: Timestamp,
    pub thread_id: Option<uuid::Uuid>,
    pub idempotency_key: Option<String>,
    pub reply_to: Option<MessageId>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveAuditRecord {
    pub message_id: MessageId,
    pub tenant_id: TenantId,
    pub created_at: Timestamp,
    pub acknowledged: bool,
    pub acknowledged_at: Option<Timestamp>,
    pub ack_message_id: Option<MessageId>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRecord {
    pub state: ComplianceState,
    pub got_program_state: bool,
    pub got_tasks: bool,
    pub got_messages: bool,
    pub journaling_active: bool,
    pub calls_since_update: u32,
}

impl Default for ComplianceRecord {
    fn default() -> Self {
        Self {
            state: ComplianceState::PendingBoot,
            got_program_state: false,
            got_tasks: false,
            got_messages: false,
            journaling_active: false,
            calls_since_update: 0,
        }
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub tenant_id: TenantId,
    pub program_id: String,
    pub human_name: Option<String>,
    pub status: SessionStatus,
    pub last_heartbeat: Timestamp,
    #[serde(skip)]
    pub context_history: VecDeque<u64>,
    pub context_bytes_total: u64,
    pub handoff: bool,
    pub archived: bool,
    pub compliance: ComplianceRecord,
    pub created_at: Timestamp,
}

impl Session {
    /// Append a context-byte-count sample, trimming the oldest entries to
    /// keep the rolling history within [`CONTEXT_HISTORY_CAP`].
    pub fn push_context_sample(&mut self, bytes: u64) {
        self.context_history.push_back(bytes);
        while self.context_history.len() > CONTEXT_HISTORY_CAP {
            self.context_history.pop_front();
        }
        self.context_bytes_total = self.context_history.iter().sum();
    }

    pub fn context_percent(&self) -> f64 {
        self.context_bytes_total as f64 / CONTEXT_WINDOW_BYTES as f64
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditId,
    pub tenant_id: TenantId,
    pub correlation_id: uuid::Uuid,
    pub actor_program: String,
    pub tool: String,
    pub endpoint: String,
    pub duration_ms: i64,
    pub outcome: String,
    pub occurred_at: Timestamp,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerId,
    pub tenant_id: TenantId,
    pub correlation_id: uuid::Uuid,
    pub tool: String,
    pub tokens_used: i64,
    pub cost_usd: f64,
    pub occurred_at: Timestamp,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSpan {
    pub id: TraceId,
    pub tenant_id: TenantId,
    pub correlation_id: uuid::Uuid,
    pub actor_program: String,
    pub endpoint: String,
    pub duration_ms: i64,
    pub outcome: String,
    pub occurred_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn new_session() -> Session {
        Session {
            id: SessionId::now_v7(),
            tenant_id: TenantId::now_v7(),
            program_id: "builder".into(),
            human_name: None,
            status: SessionStatus::Active,
            last_heartbeat: Utc::now(),
            context_history: VecDeque::new(),
            context_bytes_total: 0,
            handoff: false,
            archived: false,
            compliance: ComplianceRecord::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn context_history_bound_enforced() {
        let mut session = new_session();
        for i in 0..(CONTEXT_HISTORY_CAP + 250) {
            session.push_context_sample(i as u64);
        }
        assert_eq!(session.context_history.len(), CONTEXT_HISTORY_CAP);
        // most recent entries preserved
        assert_eq!(*session.context_history.back().unwrap(), (CONTEXT_HISTORY_CAP + 249) as u64);
    }

    #[test]
    fn context_percent_uses_fixed_window() {
        let mut session = new_session();
        session.push_context_sample(100_000);
        assert!((session.context_percent() - 0.5).abs() < f64::EPSILON);
    }

    proptest::proptest! {
        #[test]
        fn context_history_never_exceeds_cap(samples in proptest::collection::vec(0u64..10_000, 0..2_500)) {
            let mut session = new_session();
            for &sample in &samples {
                session.push_context_sample(sample);
            }
            proptest::prop_assert!(session.context_history.len() <= CONTEXT_HISTORY_CAP);
            let expected_total: u64 = session.context_history.iter().sum();
            proptest::prop_assert_eq!(session.context_bytes_total, expected_total);
        }
    }
}
