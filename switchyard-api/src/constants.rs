//! Constants for the switchyard API
//!
//! Centralizing constants makes them easy to find, modify, and test. Each
//! is also exposed as a configurable default on the relevant `*Config`
//! struct in [`crate::config`].

// ============================================================================
// AUTHENTICATION
// ============================================================================

pub const API_KEY_PREFIX: &str = "cb_";
pub const OAUTH_ACCESS_TOKEN_PREFIX: &str = "cbo_";
pub const OAUTH_REFRESH_TOKEN_PREFIX: &str = "cbr_";
pub const OAUTH_CLIENT_SECRET_PREFIX: &str = "cbs_";
pub const JWT_PREFIX: &str = "eyJ";

/// PBKDF2-SHA256 rounds used to derive the payload encryption key from an
/// opaque API key or OAuth access token (spec §4.1).
pub const PBKDF2_ROUNDS: u32 = 100_000;
pub const PBKDF2_KEY_LEN: usize = 32;
pub const API_KEY_KDF_SALT: &[u8] = b"switchyard-api-key-payload-salt-v1";
pub const OAUTH_KDF_SALT: &[u8] = b"switchyard-oauth-payload-salt-v1";

/// Minimum required length for JWT secret keys
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Default JWT token expiration time in seconds (1 hour)
pub const DEFAULT_JWT_EXPIRATION_SECS: i64 = 3600;

/// Clock-skew leeway applied when validating `exp`/`nbf` claims.
pub const JWT_CLOCK_SKEW_LEEWAY_SECS: i64 = 60;

// ============================================================================
// CORS
// ============================================================================

pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// RATE LIMITING
// ============================================================================

pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// IP-scoped brake on failed authentications (spec §4.2). Successful auth
/// never charges this window.
pub const FAILED_AUTH_IP_WINDOW_SECS: u64 = 60;
pub const FAILED_AUTH_IP_CEILING: u32 = 20;

/// Dynamic Client Registration rate limit (spec §4.7): 10/hour/IP.
pub const DCR_IP_WINDOW_SECS: u64 = 3600;
pub const DCR_IP_CEILING: u32 = 10;

// ============================================================================
// DISPATCH
// ============================================================================

/// A claimed task with no heartbeat for this long is eligible for the
/// orphan sweep (spec §4.4, §5).
pub const ORPHAN_THRESHOLD_SECS: i64 = 30 * 60;

/// Unclaim count at which a task is flagged for manual review (spec §4.4).
pub const UNCLAIM_CIRCUIT_BREAKER_THRESHOLD: i32 = 3;

// ============================================================================
// RELAY
// ============================================================================

pub const DEFAULT_MESSAGE_TTL_SECS: i64 = 24 * 60 * 60;
pub const DLQ_SWEEP_AGE_SECS: i64 = 60 * 60;
pub const MAX_DELIVERY_ATTEMPTS: i32 = 3;
pub const DLQ_SWEEP_BATCH_SIZE: i64 = 500;

// ============================================================================
// SESSION & COMPLIANCE
// ============================================================================

pub const SESSION_TIMEOUT_SECS: i64 = 65 * 60;
pub const CONTEXT_WINDOW_BYTES: u64 = 200_000;

// ============================================================================
// OAUTH
// ============================================================================

pub const PENDING_AUTH_TTL_SECS: i64 = 10 * 60;
pub const AUTH_CODE_TTL_SECS: i64 = 10 * 60;
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

// ============================================================================
// PAGINATION / TRANSPORT
// ============================================================================

pub const DEFAULT_LIST_LIMIT: i64 = 20;
pub const MAX_LIST_LIMIT: i64 = 100;
pub const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;
pub const MAX_BATCH_ITEMS: usize = 100;
