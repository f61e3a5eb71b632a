//! API configuration
//!
//! Loaded from environment variables with sensible defaults for local
//! development. Every magic number named in the dispatch/relay/session/
//! oauth modules lives here as an overridable default rather than scattered
//! through handlers.

use secrecy::SecretString;
use std::time::Duration;

use crate::constants::*;

// ============================================================================
// DATABASE
// ============================================================================

/// PostgreSQL connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub dsn: String,
    pub pool_size: usize,
}

impl DbConfig {
    /// Construct from environment variables.
    ///
    /// - `DATABASE_URL`: Postgres connection string (required, no default)
    /// - `DB_POOL_SIZE`: max pool connections (default: 16)
    pub fn from_env() -> Self {
        let dsn = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/switchyard".to_string());
        let pool_size = std::env::var("DB_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(16);
        Self { dsn, pool_size }
    }
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// JWT validation and payload-key derivation configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared secret for validating upstream identity JWTs.
    pub jwt_secret: SecretString,
    pub jwt_clock_skew_leeway_secs: i64,
    pub api_key_kdf_salt: Vec<u8>,
    pub oauth_kdf_salt: Vec<u8>,
    pub pbkdf2_rounds: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_clock_skew_leeway_secs", &self.jwt_clock_skew_leeway_secs)
            .field("pbkdf2_rounds", &self.pbkdf2_rounds)
            .finish()
    }
}

impl AuthConfig {
    /// - `JWT_SECRET`: HMAC signing secret (required, no insecure default)
    /// - `JWT_CLOCK_SKEW_LEEWAY_SECS`: validation leeway (default: 60)
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using an insecure development default");
            "dev-only-insecure-secret-change-me-before-deploy".to_string()
        });
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            tracing::warn!(
                min = MIN_JWT_SECRET_LENGTH,
                actual = secret.len(),
                "JWT_SECRET shorter than recommended minimum"
            );
        }
        let jwt_clock_skew_leeway_secs = std::env::var("JWT_CLOCK_SKEW_LEEWAY_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(JWT_CLOCK_SKEW_LEEWAY_SECS);

        Self {
            jwt_secret: SecretString::from(secret),
            jwt_clock_skew_leeway_secs,
            api_key_kdf_salt: API_KEY_KDF_SALT.to_vec(),
            oauth_kdf_salt: OAUTH_KDF_SALT.to_vec(),
            pbkdf2_rounds: PBKDF2_ROUNDS,
        }
    }
}

// ============================================================================
// RATE LIMITING
// ============================================================================

/// Per-tier request ceiling plus the IP-scoped failed-auth brake, independent
/// sliding windows (spec §4.2).
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window: Duration,
    pub failed_auth_ip_window: Duration,
    pub failed_auth_ip_ceiling: u32,
    pub dcr_ip_window: Duration,
    pub dcr_ip_ceiling: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            failed_auth_ip_window: Duration::from_secs(FAILED_AUTH_IP_WINDOW_SECS),
            failed_auth_ip_ceiling: FAILED_AUTH_IP_CEILING,
            dcr_ip_window: Duration::from_secs(DCR_IP_WINDOW_SECS),
            dcr_ip_ceiling: DCR_IP_CEILING,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let enabled = std::env::var("RATE_LIMIT_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);
        let window_secs = std::env::var("RATE_LIMIT_WINDOW_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS);

        Self {
            enabled,
            window: Duration::from_secs(window_secs),
            ..Self::default()
        }
    }
}

// ============================================================================
// DISPATCH / RELAY / SESSION TIMEOUTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct OperationalConfig {
    pub orphan_threshold_secs: i64,
    pub unclaim_circuit_breaker_threshold: i32,
    pub default_message_ttl_secs: i64,
    pub dlq_sweep_age_secs: i64,
    pub max_delivery_attempts: i32,
    pub dlq_sweep_batch_size: i64,
    pub session_timeout_secs: i64,
    pub context_window_bytes: u64,
}

impl Default for OperationalConfig {
    fn default() -> Self {
        Self {
            orphan_threshold_secs: ORPHAN_THRESHOLD_SECS,
            unclaim_circuit_breaker_threshold: UNCLAIM_CIRCUIT_BREAKER_THRESHOLD,
            default_message_ttl_secs: DEFAULT_MESSAGE_TTL_SECS,
            dlq_sweep_age_secs: DLQ_SWEEP_AGE_SECS,
            max_delivery_attempts: MAX_DELIVERY_ATTEMPTS,
            dlq_sweep_batch_size: DLQ_SWEEP_BATCH_SIZE,
            session_timeout_secs: SESSION_TIMEOUT_SECS,
            context_window_bytes: CONTEXT_WINDOW_BYTES,
        }
    }
}

impl OperationalConfig {
    pub fn from_env() -> Self {
        let orphan_threshold_secs = std::env::var("ORPHAN_THRESHOLD_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(ORPHAN_THRESHOLD_SECS);
        let session_timeout_secs = std::env::var("SESSION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(SESSION_TIMEOUT_SECS);

        Self {
            orphan_threshold_secs,
            session_timeout_secs,
            ..Self::default()
        }
    }
}

// ============================================================================
// OAUTH
// ============================================================================

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub issuer: String,
    pub pending_auth_ttl_secs: i64,
    pub auth_code_ttl_secs: i64,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            issuer: "https://switchyard.run".to_string(),
            pending_auth_ttl_secs: PENDING_AUTH_TTL_SECS,
            auth_code_ttl_secs: AUTH_CODE_TTL_SECS,
            access_token_ttl_secs: ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: REFRESH_TOKEN_TTL_SECS,
        }
    }
}

impl OAuthConfig {
    pub fn from_env() -> Self {
        let issuer = std::env::var("OAUTH_ISSUER").unwrap_or_else(|_| Self::default().issuer);
        Self {
            issuer,
            ..Self::default()
        }
    }
}

// ============================================================================
// CORS
// ============================================================================

/// CORS and body-size hardening shared across every route.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,
    pub cors_allow_credentials: bool,
    pub cors_max_age_secs: u64,
    pub max_request_body_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            max_request_body_bytes: MAX_REQUEST_BODY_BYTES,
        }
    }
}

impl ApiConfig {
    /// - `CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `CORS_MAX_AGE_SECS`: preflight cache duration (default: 86400)
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CORS_MAX_AGE_SECS);

        Self {
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            max_request_body_bytes: MAX_REQUEST_BODY_BYTES,
        }
    }

    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(pattern)
                        || origin_domain == pattern.strip_prefix('.').unwrap_or(pattern);
                }
            }
            false
        })
    }
}

// ============================================================================
// TOP-LEVEL AGGREGATE
// ============================================================================

/// Everything main.rs needs to bootstrap, assembled once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db: DbConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub operational: OperationalConfig,
    pub oauth: OAuthConfig,
    pub api: ApiConfig,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        Self {
            db: DbConfig::from_env(),
            auth: AuthConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            operational: OperationalConfig::from_env(),
            oauth: OAuthConfig::from_env(),
            api: ApiConfig::from_env(),
            bind_addr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_api_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert!(!config.cors_allow_credentials);
        assert_eq!(config.cors_max_age_secs, 86400);
    }

    #[test]
    fn test_is_production() {
        let mut config = ApiConfig::default();
        assert!(!config.is_production());
        config.cors_origins = vec!["https://switchyard.run".to_string()];
        assert!(config.is_production());
    }

    #[test]
    fn test_origin_allowed_dev_mode() {
        let config = ApiConfig::default();
        assert!(config.is_origin_allowed("https://anything.com"));
        assert!(config.is_origin_allowed("http://localhost:3000"));
    }

    #[test]
    fn test_origin_allowed_production() {
        let mut config = ApiConfig::default();
        config.cors_origins = vec![
            "https://switchyard.run".to_string(),
            "https://app.switchyard.run".to_string(),
        ];

        assert!(config.is_origin_allowed("https://switchyard.run"));
        assert!(config.is_origin_allowed("https://app.switchyard.run"));
        assert!(!config.is_origin_allowed("https://evil.com"));
    }

    #[test]
    fn test_wildcard_subdomain() {
        let mut config = ApiConfig::default();
        config.cors_origins = vec!["*.switchyard.run".to_string()];

        assert!(config.is_origin_allowed("https://app.switchyard.run"));
        assert!(!config.is_origin_allowed("https://evil.com"));
    }

    #[test]
    fn test_operational_defaults_match_constants() {
        let config = OperationalConfig::default();
        assert_eq!(config.orphan_threshold_secs, ORPHAN_THRESHOLD_SECS);
        assert_eq!(config.session_timeout_secs, SESSION_TIMEOUT_SECS);
    }
}
