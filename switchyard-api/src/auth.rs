//! Multi-scheme authentication and tenant resolution.
//!
//! Converts a bearer credential into an [`AuthContext`] or rejects it.
//! Scheme is selected by a cheap prefix test before any store lookup:
//! `eyJ` → identity JWT, `cb_` → opaque API key, `cbo_` → OAuth access
//! token. Anything else is an immediate [`ApiError::unauthorized`].

use hmac::Hmac;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use once_cell::sync::Lazy;
use pbkdf2::pbkdf2;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use switchyard_core::{digest_secret, EntityIdType, RateLimitTier, TenantId};

use crate::config::AuthConfig;
use crate::constants::{API_KEY_PREFIX, JWT_PREFIX, OAUTH_ACCESS_TOKEN_PREFIX, PBKDF2_KEY_LEN};
use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};

/// Result of successfully authenticating a request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub tenant_id: TenantId,
    pub program_id: String,
    pub capabilities: Vec<String>,
    pub rate_limit_tier: RateLimitTier,
    pub oauth_scopes: Option<Vec<String>>,
    /// Symmetric key derived from the opaque credential; never the raw
    /// credential itself, never logged.
    pub payload_key: [u8; PBKDF2_KEY_LEN],
    pub method: AuthMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    OAuthAccessToken,
    IdentityJwt,
}

/// Claims carried by the upstream identity JWT. Capabilities are never read
/// from the token — they come from [`program_default_capabilities`] so a
/// caller can't mint a token claiming a broader grant than its program has.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub tenant_id: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Server-side program → capability defaults for identity-JWT callers.
/// Unlisted programs get [`DEFAULT_PROGRAM_CAPABILITIES`], a read-only
/// floor, rather than being rejected outright.
static PROGRAM_CAPABILITY_DEFAULTS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "orchestrator",
        &["dispatch.read", "dispatch.write", "relay.read", "relay.write", "session.read", "session.write"][..],
    );
    m.insert(
        "builder-1",
        &["dispatch.read", "dispatch.write", "relay.read", "relay.write", "session.read", "session.write"][..],
    );
    m.insert(
        "builder-2",
        &["dispatch.read", "dispatch.write", "relay.read", "relay.write", "session.read", "session.write"][..],
    );
    m.insert("reviewer-1", &["dispatch.read", "relay.read", "relay.write", "session.read", "session.write"][..]);
    m
});

const DEFAULT_PROGRAM_CAPABILITIES: &[&str] = &["dispatch.read", "relay.read", "session.read"];

fn program_default_capabilities(program_id: &str) -> Vec<String> {
    PROGRAM_CAPABILITY_DEFAULTS
        .get(program_id)
        .copied()
        .unwrap_or(DEFAULT_PROGRAM_CAPABILITIES)
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Detects which scheme a raw credential uses without touching the store.
fn detect_scheme(credential: &str) -> Option<AuthMethod> {
    if credential.starts_with(JWT_PREFIX) {
        Some(AuthMethod::IdentityJwt)
    } else if credential.starts_with(OAUTH_ACCESS_TOKEN_PREFIX) {
        Some(AuthMethod::OAuthAccessToken)
    } else if credential.starts_with(API_KEY_PREFIX) {
        Some(AuthMethod::ApiKey)
    } else {
        None
    }
}

/// Entry point used by the auth middleware. `credential` is the raw bearer
/// token, already stripped of any `Bearer ` prefix.
pub async fn authenticate(db: &DbClient, auth_config: &AuthConfig, credential: &str) -> ApiResult<AuthContext> {
    match detect_scheme(credential) {
        Some(AuthMethod::ApiKey) => authenticate_api_key(db, auth_config, credential).await,
        Some(AuthMethod::OAuthAccessToken) => authenticate_oauth_token(db, auth_config, credential).await,
        Some(AuthMethod::IdentityJwt) => authenticate_identity_jwt(db, auth_config, credential).await,
        None => Err(ApiError::unauthorized("Unrecognized credential format")),
    }
}

async fn authenticate_api_key(db: &DbClient, auth_config: &AuthConfig, raw_key: &str) -> ApiResult<AuthContext> {
    let key_hash = digest_secret(raw_key);
    let record = db
        .api_key_get_by_hash(&key_hash)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid API key"))?;

    if !record.active || record.revoked_at.is_some() {
        return Err(ApiError::unauthorized("API key has been revoked"));
    }
    if let Some(expires_at) = record.expires_at {
        if expires_at <= chrono::Utc::now() {
            return Err(ApiError::unauthorized("API key has expired"));
        }
    }

    let payload_key = derive_payload_key(raw_key, &auth_config.api_key_kdf_salt, auth_config.pbkdf2_rounds);

    let key_id = record.id;
    let db_for_touch = db.clone();
    tokio::spawn(async move {
        db_for_touch.api_key_touch_last_used(key_id).await;
    });

    Ok(AuthContext {
        tenant_id: record.tenant_id,
        program_id: record.program_id,
        capabilities: record.capabilities,
        rate_limit_tier: record.rate_limit_tier,
        oauth_scopes: None,
        payload_key,
        method: AuthMethod::ApiKey,
    })
}

async fn authenticate_oauth_token(db: &DbClient, auth_config: &AuthConfig, raw_token: &str) -> ApiResult<AuthContext> {
    let token_hash = digest_secret(raw_token);
    let record = db
        .oauth_token_get_by_hash(&token_hash)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid OAuth access token"))?;

    if record.kind != switchyard_core::OAuthTokenKind::Access {
        return Err(ApiError::unauthorized("Token is not an access token"));
    }
    if !record.active || record.revoked_at.is_some() {
        return Err(ApiError::unauthorized("OAuth token has been revoked"));
    }
    if record.expires_at <= chrono::Utc::now() {
        return Err(ApiError::unauthorized("OAuth token has expired"));
    }

    let payload_key = derive_payload_key(
        &record.tenant_id.to_string(),
        &auth_config.oauth_kdf_salt,
        auth_config.pbkdf2_rounds,
    );

    let client_id = record.client_id;
    let db_for_touch = db.clone();
    tokio::spawn(async move {
        db_for_touch.oauth_client_touch_last_used(client_id).await;
    });

    Ok(AuthContext {
        tenant_id: record.tenant_id,
        program_id: "oauth".to_string(),
        capabilities: Vec::new(),
        rate_limit_tier: RateLimitTier::Standard,
        oauth_scopes: Some(record.scope.split(' ').map(str::to_string).filter(|s| !s.is_empty()).collect()),
        payload_key,
        method: AuthMethod::OAuthAccessToken,
    })
}

async fn authenticate_identity_jwt(db: &DbClient, auth_config: &AuthConfig, token: &str) -> ApiResult<AuthContext> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = auth_config.jwt_clock_skew_leeway_secs.max(0) as u64;

    let decoding_key = DecodingKey::from_secret(auth_config.jwt_secret.expose_secret().as_bytes());

    let token_data = decode::<IdentityClaims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::token_expired(),
        _ => ApiError::invalid_token("Invalid identity token"),
    })?;
    let claims = token_data.claims;

    let tenant_id: TenantId = claims
        .tenant_id
        .parse()
        .map_err(|_| ApiError::invalid_token("Identity token carries an invalid tenant id"))?;

    // Resolve a non-canonical alias if one exists; resolution failure never
    // blocks authentication, it only affects tenant scoping.
    let resolved_tenant = match db.tenant_resolve_alias(&claims.tenant_id).await {
        Ok(Some(canonical)) => canonical,
        _ => tenant_id,
    };

    let payload_key = derive_payload_key(&claims.sub, &auth_config.oauth_kdf_salt, auth_config.pbkdf2_rounds);

    let capabilities = program_default_capabilities(&claims.sub);

    Ok(AuthContext {
        tenant_id: resolved_tenant,
        program_id: claims.sub,
        capabilities,
        rate_limit_tier: RateLimitTier::Standard,
        oauth_scopes: None,
        payload_key,
        method: AuthMethod::IdentityJwt,
    })
}

/// PBKDF2-HMAC-SHA256(raw, salt, rounds, 32 bytes). Used to derive a
/// symmetric payload-encryption key from an opaque credential that is
/// itself never persisted.
fn derive_payload_key(raw: &str, salt: &[u8], rounds: u32) -> [u8; PBKDF2_KEY_LEN] {
    let mut out = [0u8; PBKDF2_KEY_LEN];
    pbkdf2::<Hmac<Sha256>>(raw.as_bytes(), salt, rounds, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_scheme_by_prefix() {
        assert_eq!(detect_scheme("cb_abc123"), Some(AuthMethod::ApiKey));
        assert_eq!(detect_scheme("cbo_abc123"), Some(AuthMethod::OAuthAccessToken));
        assert_eq!(
            detect_scheme("eyJhbGciOiJIUzI1NiJ9.x.y"),
            Some(AuthMethod::IdentityJwt)
        );
        assert_eq!(detect_scheme("garbage"), None);
    }

    #[test]
    fn known_program_gets_its_default_capability_set() {
        let caps = program_default_capabilities("orchestrator");
        assert!(caps.iter().any(|c| c == "dispatch.write"));
    }

    #[test]
    fn unknown_program_gets_read_only_floor() {
        let caps = program_default_capabilities("some-unlisted-program");
        assert_eq!(caps, DEFAULT_PROGRAM_CAPABILITIES.to_vec());
        assert!(!caps.iter().any(|c| c.ends_with(".write")));
    }

    #[test]
    fn derive_payload_key_is_deterministic() {
        let k1 = derive_payload_key("cb_abc", b"salt", 1000);
        let k2 = derive_payload_key("cb_abc", b"salt", 1000);
        assert_eq!(k1, k2);
        let k3 = derive_payload_key("cb_other", b"salt", 1000);
        assert_ne!(k1, k3);
    }
}
