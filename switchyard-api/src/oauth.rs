//! OAuth 2.1 authorization server business logic (spec §4.7): dynamic
//! client registration, the authorize/consent/callback dance, PKCE
//! verification, and authorization-code/refresh-token grants with
//! rotation and family-theft revocation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::constants::{
    OAUTH_ACCESS_TOKEN_PREFIX, OAUTH_CLIENT_SECRET_PREFIX, OAUTH_REFRESH_TOKEN_PREFIX,
};
use crate::db::DbClient;
use crate::error::ApiResult;
use switchyard_core::{
    digest_secret, AuthorizationCode, OAuthClient, OAuthClientAuthMethod, OAuthClientId,
    OAuthError, OAuthTokenKind, OAuthTokenRecord, PendingAuthId, PendingAuthorization, TenantId,
};

/// Generates an opaque bearer secret: `{prefix}{32 random url-safe bytes}`,
/// returning both the raw value (shown to the caller once) and its hex
/// SHA-256 digest (the only form ever stored).
fn generate_opaque_secret(prefix: &str) -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    let raw = format!("{prefix}{}", URL_SAFE_NO_PAD.encode(bytes));
    let digest = digest_secret(&raw);
    (raw, digest)
}

/// `code_challenge = base64url_nopad(sha256(code_verifier))`, S256 only.
pub fn pkce_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Verifies a presented `code_verifier` against the stored S256 challenge.
/// Any method other than `S256` is rejected outright — PKCE is mandatory
/// and plaintext challenges are not supported (spec §4.7 security invariants).
pub fn pkce_verify(code_verifier: &str, code_challenge: &str, code_challenge_method: &str) -> bool {
    code_challenge_method == "S256" && pkce_challenge(code_verifier) == code_challenge
}

/// Redirect URIs must be `https://` or point at localhost (spec §4.7 DCR).
pub fn is_allowed_redirect_uri(uri: &str) -> bool {
    uri.starts_with("https://")
        || uri.starts_with("http://localhost")
        || uri.starts_with("http://127.0.0.1")
}

/// Dynamic Client Registration. `client_secret_hash`/raw secret are only
/// populated for `client_credentials`-capable (service-account) clients;
/// public clients authenticate with `none` plus PKCE.
pub async fn register_client(
    db: &DbClient,
    client_name: &str,
    redirect_uris: &[String],
    grant_types: &[String],
    response_types: &[String],
    tenant_id: Option<TenantId>,
) -> ApiResult<(OAuthClient, Option<String>)> {
    for uri in redirect_uris {
        if !is_allowed_redirect_uri(uri) {
            return Err(OAuthError::InvalidRequest(format!("redirect_uri '{uri}' is not localhost or https")).into());
        }
    }

    let is_service_account = grant_types.iter().any(|g| g == "client_credentials");
    let (raw_secret, secret_hash) = if is_service_account {
        let (raw, hash) = generate_opaque_secret(OAUTH_CLIENT_SECRET_PREFIX);
        (Some(raw), Some(hash))
    } else {
        (None, None)
    };
    let auth_method = if is_service_account {
        OAuthClientAuthMethod::ClientSecretPost
    } else {
        OAuthClientAuthMethod::None
    };

    let client = db
        .oauth_client_create(
            client_name,
            redirect_uris,
            grant_types,
            response_types,
            auth_method,
            secret_hash.as_deref(),
            tenant_id,
        )
        .await?;
    Ok((client, raw_secret))
}

/// `GET /authorize` entry point: validates the client/redirect/PKCE and
/// stores a pending authorization keyed by a fresh id, expiring in
/// `ttl_secs`.
#[allow(clippy::too_many_arguments)]
pub async fn start_authorization(
    db: &DbClient,
    client_id: OAuthClientId,
    redirect_uri: &str,
    code_challenge: &str,
    code_challenge_method: &str,
    state: &str,
    scope: &str,
    ttl_secs: i64,
) -> ApiResult<PendingAuthorization> {
    let client = db
        .oauth_client_get(client_id)
        .await?
        .ok_or_else(|| OAuthError::InvalidRequest("unknown client_id".to_string()))?;

    if !client.redirect_uris.iter().any(|u| u == redirect_uri) {
        return Err(OAuthError::InvalidRequest("redirect_uri not registered for client".to_string()).into());
    }
    if state.is_empty() {
        return Err(OAuthError::InvalidRequest("state is required".to_string()).into());
    }
    if code_challenge_method != "S256" {
        return Err(OAuthError::InvalidRequest("only S256 PKCE is supported".to_string()).into());
    }

    db.oauth_pending_auth_create(client_id, redirect_uri, code_challenge, code_challenge_method, state, scope, ttl_secs)
        .await
}

pub async fn get_pending_authorization(db: &DbClient, id: PendingAuthId) -> ApiResult<PendingAuthorization> {
    db.oauth_pending_auth_get(id)
        .await?
        .ok_or_else(|| OAuthError::InvalidRequest("pending authorization not found or expired".to_string()).into())
}

/// `GET /authorize/callback`: mints a single-use authorization code bound
/// to the verified identity, then deletes the pending record.
pub async fn complete_authorization(
    db: &DbClient,
    pending_id: PendingAuthId,
    user_id: TenantId,
    ttl_secs: i64,
) -> ApiResult<(PendingAuthorization, String)> {
    let pending = get_pending_authorization(db, pending_id).await?;
    let (raw_code, code_hash) = generate_opaque_secret("");

    db.oauth_code_create(
        &code_hash,
        pending.client_id,
        user_id,
        &pending.redirect_uri,
        &pending.code_challenge,
        &pending.code_challenge_method,
        &pending.state,
        &pending.scope,
        ttl_secs,
    )
    .await?;
    db.oauth_pending_auth_delete(pending_id).await?;

    Ok((pending, raw_code))
}

/// `POST /token`, `grant_type=authorization_code`. Re-checks client id,
/// redirect URI, and the PKCE verifier inside the same atomic consume —
/// any mismatch surfaces as the generic `invalid_grant`.
pub async fn exchange_authorization_code(
    db: &DbClient,
    code: &str,
    client_id: OAuthClientId,
    redirect_uri: &str,
    code_verifier: &str,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
) -> ApiResult<(String, String, OAuthTokenRecord)> {
    let code_hash = digest_secret(code);
    let record = db
        .oauth_code_consume(&code_hash)
        .await?
        .ok_or_else(|| OAuthError::InvalidGrant("code already used, unknown, or expired".to_string()))?;

    if record.client_id != client_id
        || record.redirect_uri != redirect_uri
        || !pkce_verify(code_verifier, &record.code_challenge, &record.code_challenge_method)
    {
        return Err(OAuthError::InvalidGrant("client/redirect/PKCE mismatch".to_string()).into());
    }

    mint_token_pair(db, record.user_id, client_id, &record.scope, Uuid::new_v4(), None, access_ttl_secs, refresh_ttl_secs).await
}

/// `POST /token`, `grant_type=refresh_token`. A refresh token presented a
/// second time (already rotated away) revokes its whole family and fails
/// `invalid_grant` — the standard rotation-theft response.
pub async fn exchange_refresh_token(
    db: &DbClient,
    refresh_token: &str,
    client_id: OAuthClientId,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
) -> ApiResult<(String, String, OAuthTokenRecord)> {
    if !refresh_token.starts_with(OAUTH_REFRESH_TOKEN_PREFIX) {
        return Err(OAuthError::InvalidGrant("not a refresh token".to_string()).into());
    }
    let token_hash = digest_secret(refresh_token);
    let record = db
        .oauth_token_get_by_hash(&token_hash)
        .await?
        .ok_or_else(|| OAuthError::InvalidGrant("unknown refresh token".to_string()))?;

    if record.kind != OAuthTokenKind::Refresh || record.client_id != client_id {
        return Err(OAuthError::InvalidGrant("token kind or client mismatch".to_string()).into());
    }
    if !record.active {
        db.oauth_token_revoke_family(record.family_id).await?;
        return Err(OAuthError::InvalidGrant("refresh token reuse detected, family revoked".to_string()).into());
    }
    if record.expires_at < chrono::Utc::now() {
        return Err(OAuthError::InvalidGrant("refresh token expired".to_string()).into());
    }

    db.oauth_token_revoke(&token_hash).await?;
    mint_token_pair(
        db,
        record.tenant_id,
        client_id,
        &record.scope,
        record.family_id,
        Some(token_hash.as_str()),
        access_ttl_secs,
        refresh_ttl_secs,
    )
    .await
}

async fn mint_token_pair(
    db: &DbClient,
    tenant_id: TenantId,
    client_id: OAuthClientId,
    scope: &str,
    family_id: Uuid,
    parent_hash: Option<&str>,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
) -> ApiResult<(String, String, OAuthTokenRecord)> {
    let (raw_access, access_hash) = generate_opaque_secret(OAUTH_ACCESS_TOKEN_PREFIX);
    let access_record = db
        .oauth_token_create(&access_hash, OAuthTokenKind::Access, tenant_id, client_id, scope, family_id, None, access_ttl_secs)
        .await?;

    let (raw_refresh, refresh_hash) = generate_opaque_secret(OAUTH_REFRESH_TOKEN_PREFIX);
    db.oauth_token_create(&refresh_hash, OAuthTokenKind::Refresh, tenant_id, client_id, scope, family_id, parent_hash, refresh_ttl_secs)
        .await?;

    Ok((raw_access, raw_refresh, access_record))
}

/// `POST /revoke` (RFC 7009). Revoking a refresh token cascades to its
/// whole family; revoking an access token only deactivates that one row.
/// Always succeeds from the caller's perspective, per the RFC.
pub async fn revoke_token(db: &DbClient, token: &str) -> ApiResult<()> {
    let token_hash = digest_secret(token);
    if let Some(record) = db.oauth_token_get_by_hash(&token_hash).await? {
        if record.kind == OAuthTokenKind::Refresh {
            db.oauth_token_revoke_family(record.family_id).await?;
        } else {
            db.oauth_token_revoke(&token_hash).await?;
        }
    }
    Ok(())
}

pub async fn cleanup_expired_pending_authorizations(db: &DbClient) -> ApiResult<usize> {
    Ok(db.oauth_pending_auth_sweep_expired().await? as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_verify_accepts_matching_verifier() {
        let verifier = "a".repeat(43);
        let challenge = pkce_challenge(&verifier);
        assert!(pkce_verify(&verifier, &challenge, "S256"));
    }

    #[test]
    fn pkce_verify_rejects_wrong_verifier() {
        let challenge = pkce_challenge(&"a".repeat(43));
        assert!(!pkce_verify(&"b".repeat(43), &challenge, "S256"));
    }

    #[test]
    fn pkce_verify_rejects_non_s256_method() {
        let verifier = "a".repeat(43);
        let challenge = pkce_challenge(&verifier);
        assert!(!pkce_verify(&verifier, &challenge, "plain"));
    }

    proptest::proptest! {
        #[test]
        fn pkce_round_trips_for_any_verifier(verifier in "[A-Za-z0-9._~-]{43,128}") {
            let challenge = pkce_challenge(&verifier);
            proptest::prop_assert!(pkce_verify(&verifier, &challenge, "S256"));
        }

        #[test]
        fn pkce_rejects_any_mismatched_verifier(
            verifier in "[A-Za-z0-9._~-]{43,128}",
            other in "[A-Za-z0-9._~-]{43,128}",
        ) {
            proptest::prop_assume!(verifier != other);
            let challenge = pkce_challenge(&verifier);
            proptest::prop_assert!(!pkce_verify(&other, &challenge, "S256"));
        }
    }

    #[test]
    fn redirect_uri_allows_https_and_localhost() {
        assert!(is_allowed_redirect_uri("https://example.com/cb"));
        assert!(is_allowed_redirect_uri("http://localhost:8787/cb"));
        assert!(!is_allowed_redirect_uri("http://example.com/cb"));
    }

    #[test]
    fn generated_opaque_secret_carries_prefix_and_hashes_deterministically() {
        let (raw, hash) = generate_opaque_secret("cbo_");
        assert!(raw.starts_with("cbo_"));
        assert_eq!(digest_secret(&raw), hash);
    }
}
