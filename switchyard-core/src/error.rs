//! Domain error types. Transport-agnostic: this crate never depends on
//! Axum or any HTTP types. `switchyard-api` maps these onto `ApiError`.

use crate::identity::{SessionId, TaskId};
use thiserror::Error;

/// Storage/transaction-layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("not found: {entity} {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("connection pool exhausted")]
    PoolExhausted,
}

/// Task dispatch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("task not claimable in status {status}")]
    NotClaimable { status: String },

    #[error("task {0} not active, cannot complete or unclaim")]
    NotActive(TaskId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Relay engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("unknown relay group: {0}")]
    UnknownGroup(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Session / compliance errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComplianceError {
    #[error("session {0} has been terminated")]
    SessionTerminated(SessionId),

    #[error("invalid session id format: {0}")]
    InvalidSessionIdFormat(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// OAuth 2.1 authorization-server errors. Exchange-path variants are always
/// surfaced to the client as the generic `invalid_grant` per spec §4.7 /
/// §7 — the specific variant is for internal logging only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OAuthError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    #[error("unsupported_response_type")]
    UnsupportedResponseType,

    #[error("access_denied")]
    AccessDenied,

    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    #[error("too_many_requests")]
    TooManyRequests,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Plain field-level validation error, aggregated by handlers into the
/// HTTP 400 `issues` array.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: &'static str,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }
}
