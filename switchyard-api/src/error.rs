//! Error types for the switchyard API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.
//! Category boundaries follow the taxonomy agents are expected to branch
//! on: validation / authentication / capability / rate_limit /
//! compliance_blocked / pricing / conflict / oauth / transient / internal.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use switchyard_core::{ComplianceError, DispatchError, OAuthError, RelayError, StorageError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur during API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication (401)
    // ========================================================================
    /// Request lacks valid authentication credentials
    Unauthorized,

    /// Authentication credential is invalid or malformed
    InvalidToken,

    /// Authentication credential has expired
    TokenExpired,

    // ========================================================================
    // Capability / scope (403)
    // ========================================================================
    /// Authenticated principal lacks the required capability or scope
    Forbidden,

    /// Session has been derezzed by the compliance state machine
    ComplianceBlocked,

    // ========================================================================
    // Validation (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Field value is out of valid range
    InvalidRange,

    /// Field format is incorrect
    InvalidFormat,

    // ========================================================================
    // Not Found (404)
    // ========================================================================
    /// Requested entity does not exist
    EntityNotFound,

    /// Requested tenant does not exist
    TenantNotFound,

    /// Requested task does not exist
    TaskNotFound,

    /// Requested relay message does not exist
    MessageNotFound,

    /// Requested session does not exist
    SessionNotFound,

    /// Requested API key does not exist
    ApiKeyNotFound,

    /// Requested OAuth client does not exist
    OAuthClientNotFound,

    // ========================================================================
    // Conflict / precondition (409, 410)
    // ========================================================================
    /// Entity with the same identifier already exists
    EntityAlreadyExists,

    /// Task is not in a claimable state (already claimed, completed, or cancelled)
    NotClaimable,

    /// Task is not active and cannot accept the requested transition
    NotActive,

    /// Idempotency key was reused with a different request body
    IdempotencyConflict,

    /// Resource existed but is no longer reachable (e.g. expired pending auth)
    Gone,

    // ========================================================================
    // Billing (402)
    // ========================================================================
    /// Tenant has exceeded its plan allotment
    PricingRequired,

    // ========================================================================
    // Rate limiting (429)
    // ========================================================================
    /// Request rate limit exceeded
    TooManyRequests,

    // ========================================================================
    // OAuth 2.1 (400, per RFC 6749 §5.2 — always surfaced generically)
    // ========================================================================
    /// Generic OAuth token/authorize failure; never distinguishes *why* a
    /// grant failed to a client that doesn't already hold the client secret.
    OAuthInvalidGrant,

    /// `response_type` the authorization endpoint does not support
    OAuthUnsupportedResponseType,

    /// Resource owner or authorization server denied the request
    OAuthAccessDenied,

    // ========================================================================
    // Server errors (500, 502, 503, 504)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed in a way that may succeed on retry
    TransientStoreError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,

    /// Operation timed out
    Timeout,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }

            ErrorCode::Forbidden | ErrorCode::ComplianceBlocked => StatusCode::FORBIDDEN,

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidRange
            | ErrorCode::InvalidFormat
            | ErrorCode::OAuthInvalidGrant
            | ErrorCode::OAuthUnsupportedResponseType
            | ErrorCode::OAuthAccessDenied => StatusCode::BAD_REQUEST,

            ErrorCode::EntityNotFound
            | ErrorCode::TenantNotFound
            | ErrorCode::TaskNotFound
            | ErrorCode::MessageNotFound
            | ErrorCode::SessionNotFound
            | ErrorCode::ApiKeyNotFound
            | ErrorCode::OAuthClientNotFound => StatusCode::NOT_FOUND,

            ErrorCode::EntityAlreadyExists
            | ErrorCode::NotClaimable
            | ErrorCode::NotActive
            | ErrorCode::IdempotencyConflict => StatusCode::CONFLICT,

            ErrorCode::Gone => StatusCode::GONE,

            ErrorCode::PricingRequired => StatusCode::PAYMENT_REQUIRED,

            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,

            ErrorCode::ServiceUnavailable | ErrorCode::ConnectionPoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InternalError | ErrorCode::TransientStoreError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::InvalidToken => "Invalid authentication credential",
            ErrorCode::TokenExpired => "Authentication credential has expired",
            ErrorCode::Forbidden => "Missing required capability or scope",
            ErrorCode::ComplianceBlocked => "Session has been derezzed",

            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidRange => "Value is out of valid range",
            ErrorCode::InvalidFormat => "Invalid format",

            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::TenantNotFound => "Tenant not found",
            ErrorCode::TaskNotFound => "Task not found",
            ErrorCode::MessageNotFound => "Message not found",
            ErrorCode::SessionNotFound => "Session not found",
            ErrorCode::ApiKeyNotFound => "API key not found",
            ErrorCode::OAuthClientNotFound => "OAuth client not found",

            ErrorCode::EntityAlreadyExists => "Entity already exists",
            ErrorCode::NotClaimable => "Task is not in a claimable state",
            ErrorCode::NotActive => "Task is not active",
            ErrorCode::IdempotencyConflict => "Idempotency key reused with a different request",
            ErrorCode::Gone => "Resource is no longer available",

            ErrorCode::PricingRequired => "Plan allotment exceeded",

            ErrorCode::TooManyRequests => "Rate limit exceeded",

            ErrorCode::OAuthInvalidGrant => "invalid_grant",
            ErrorCode::OAuthUnsupportedResponseType => "unsupported_response_type",
            ErrorCode::OAuthAccessDenied => "access_denied",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::TransientStoreError => "Store operation failed, retry with the same idempotency key",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
            ErrorCode::Timeout => "Operation timed out",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
///
/// This type is returned by all API endpoints when an error occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (field issues, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,

    /// Present only on 429 responses; seconds until the caller may retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            retry_after_secs: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
            retry_after_secs: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn compliance_blocked(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ComplianceBlocked, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    pub fn token_expired() -> Self {
        Self::from_code(ErrorCode::TokenExpired)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Validation failure carrying a structured `issues: [{field, message, code}]` array.
    pub fn validation_issues(issues: &[switchyard_core::ValidationError]) -> Self {
        let issues_json: Vec<serde_json::Value> = issues
            .iter()
            .map(|i| serde_json::json!({"field": i.field, "message": i.message, "code": i.code}))
            .collect();
        Self::new(ErrorCode::ValidationFailed, "Request validation failed")
            .with_details(serde_json::json!({ "issues": issues_json }))
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn invalid_range(field: &str, min: impl fmt::Display, max: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("Field '{}' must be between {} and {}", field, min, max),
        )
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    pub fn entity_not_found(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} with id {} not found", entity_type, id),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EntityNotFound, message)
    }

    pub fn tenant_not_found(tenant_id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::TenantNotFound, format!("Tenant {} not found", tenant_id))
    }

    pub fn task_not_found(task_id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::TaskNotFound, format!("Task {} not found", task_id))
    }

    pub fn message_not_found(message_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::MessageNotFound,
            format!("Message {} not found", message_id),
        )
    }

    pub fn session_not_found(session_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::SessionNotFound,
            format!("Session {} not found", session_id),
        )
    }

    pub fn api_key_not_found(api_key_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ApiKeyNotFound,
            format!("API key {} not found", api_key_id),
        )
    }

    pub fn oauth_client_not_found(client_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::OAuthClientNotFound,
            format!("OAuth client {} not found", client_id),
        )
    }

    pub fn entity_already_exists(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityAlreadyExists,
            format!("{} with id {} already exists", entity_type, id),
        )
    }

    pub fn not_claimable(status: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::NotClaimable,
            format!("Task is not claimable in status {}", status),
        )
    }

    pub fn not_active(task_id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::NotActive, format!("Task {} is not active", task_id))
    }

    pub fn idempotency_conflict() -> Self {
        Self::from_code(ErrorCode::IdempotencyConflict)
    }

    pub fn gone(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Gone, message)
    }

    pub fn pricing_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PricingRequired, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn transient_store_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransientStoreError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(ErrorCode::Timeout, format!("Operation '{}' timed out", operation))
    }

    /// Rate-limit error; stamps `retry_after_secs` so the `IntoResponse` impl
    /// can mirror it onto a `Retry-After` header.
    pub fn too_many_requests(retry_after_secs: Option<u64>) -> Self {
        let message = match retry_after_secs {
            Some(secs) => format!("Rate limit exceeded. Retry after {} seconds", secs),
            None => "Rate limit exceeded".to_string(),
        };
        let mut err = Self::new(ErrorCode::TooManyRequests, message);
        err.retry_after_secs = retry_after_secs;
        err
    }

    /// OAuth token/authorize endpoint errors are always surfaced generically:
    /// a client probing for *why* an exchange failed never learns whether the
    /// code, redirect_uri, or PKCE verifier was the mismatch.
    pub fn oauth_invalid_grant() -> Self {
        Self::from_code(ErrorCode::OAuthInvalidGrant)
    }

    pub fn oauth_unsupported_response_type() -> Self {
        Self::from_code(ErrorCode::OAuthUnsupportedResponseType)
    }

    pub fn oauth_access_denied() -> Self {
        Self::from_code(ErrorCode::OAuthAccessDenied)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = self.retry_after_secs;
        let mut headers = HeaderMap::new();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                headers.insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        let body = Json(serde_json::json!({
            "success": false,
            "error": self,
            "meta": { "timestamp": chrono::Utc::now() },
        }));
        (status, headers, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => ApiError::entity_not_found(&entity, id),
            StorageError::TransactionFailed { reason } => {
                tracing::error!(reason = %reason, "storage transaction failed");
                ApiError::transient_store_error("Store operation failed")
            }
            StorageError::PoolExhausted => ApiError::connection_pool_exhausted(),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotClaimable { status } => ApiError::not_claimable(status),
            DispatchError::NotActive(id) => ApiError::not_active(id),
            DispatchError::Storage(inner) => inner.into(),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::UnknownGroup(group) => {
                ApiError::validation_failed(format!("Unknown relay group '{}'", group))
            }
            RelayError::Storage(inner) => inner.into(),
        }
    }
}

impl From<ComplianceError> for ApiError {
    fn from(err: ComplianceError) -> Self {
        match err {
            ComplianceError::SessionTerminated(id) => {
                ApiError::compliance_blocked(format!("Session {} has been derezzed", id))
            }
            ComplianceError::InvalidSessionIdFormat(raw) => {
                ApiError::invalid_format("session_id", &raw)
            }
            ComplianceError::Storage(inner) => inner.into(),
        }
    }
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::InvalidRequest(reason) => {
                tracing::debug!(reason = %reason, "oauth invalid_request");
                ApiError::validation_failed("invalid_request")
            }
            OAuthError::UnsupportedResponseType => ApiError::oauth_unsupported_response_type(),
            OAuthError::AccessDenied => ApiError::oauth_access_denied(),
            OAuthError::InvalidGrant(reason) => {
                tracing::debug!(reason = %reason, "oauth invalid_grant");
                ApiError::oauth_invalid_grant()
            }
            OAuthError::TooManyRequests => ApiError::too_many_requests(None),
            OAuthError::Storage(inner) => inner.into(),
        }
    }
}

// ============================================================================
// CONVERSIONS FROM STANDARD ERRORS
// ============================================================================

impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        ApiError::transient_store_error("Database operation failed")
    }
}

impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);
        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::transient_store_error("Failed to acquire database connection"),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

impl From<uuid::Error> for ApiError {
    fn from(err: uuid::Error) -> Self {
        ApiError::invalid_format("id", &format!("valid UUID: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::ComplianceBlocked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::ValidationFailed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::EntityNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::NotClaimable.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::Gone.status_code(), StatusCode::GONE);
        assert_eq!(ErrorCode::PricingRequired.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(ErrorCode::OAuthInvalidGrant.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::ServiceUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_api_error_constructors() {
        let err = ApiError::unauthorized("Invalid credentials");
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert_eq!(err.message, "Invalid credentials");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = ApiError::task_not_found("123");
        assert_eq!(err.code, ErrorCode::TaskNotFound);
        assert!(err.message.contains("123"));

        let err = ApiError::missing_field("name");
        assert_eq!(err.code, ErrorCode::MissingField);
        assert!(err.message.contains("name"));
    }

    #[test]
    fn test_oauth_errors_are_generic() {
        let err = ApiError::oauth_invalid_grant();
        assert_eq!(err.message, "invalid_grant");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_too_many_requests_carries_retry_after() {
        let err = ApiError::too_many_requests(Some(30));
        assert_eq!(err.retry_after_secs, Some(30));
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_api_error_with_details() {
        let details = serde_json::json!({
            "field": "email",
            "constraint": "must be valid email address"
        });

        let err = ApiError::validation_failed("Invalid email").with_details(details.clone());

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details, Some(details));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::unauthorized("Invalid token");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("UNAUTHORIZED"));
        assert!(json.contains("Invalid token"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::transient_store_error("Connection failed");
        let display = format!("{}", err);

        assert!(display.contains("TransientStoreError"));
        assert!(display.contains("Connection failed"));
    }

    #[test]
    fn test_storage_not_found_conversion() {
        let storage_err = StorageError::NotFound {
            entity: "Task".to_string(),
            id: "abc".to_string(),
        };
        let api_err: ApiError = storage_err.into();
        assert_eq!(api_err.code, ErrorCode::EntityNotFound);
    }
}
