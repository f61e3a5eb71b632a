//! OAuth 2.1 authorization server surface (spec §4.7): DCR, the
//! authorize/consent/callback dance, and the token/revoke endpoints.
//!
//! Unlike `/v1/*`, these routes sit outside the API-key/bearer auth stack —
//! they're how a caller *obtains* a bearer token in the first place.

use axum::extract::{ConnectInfo, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::config::AppConfig;
use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::middleware::RateLimitState;
use crate::oauth;
use crate::routes::ok;
use crate::state::AppState;
use switchyard_core::{OAuthClientId, PendingAuthId, TenantId};

async fn well_known_metadata(State(config): State<std::sync::Arc<AppConfig>>) -> impl IntoResponse {
    let issuer = &config.oauth.issuer;
    Json(serde_json::json!({
        "issuer": issuer,
        "registration_endpoint": format!("{issuer}/register"),
        "authorization_endpoint": format!("{issuer}/authorize"),
        "token_endpoint": format!("{issuer}/token"),
        "revocation_endpoint": format!("{issuer}/revoke"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token", "client_credentials"],
        "code_challenge_methods_supported": ["S256"],
        "token_endpoint_auth_methods_supported": ["none", "client_secret_post"],
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterClientRequest {
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<String>,
    #[serde(default = "default_response_types")]
    pub response_types: Vec<String>,
    pub tenant_id: Option<TenantId>,
}

fn default_grant_types() -> Vec<String> {
    vec!["authorization_code".to_string(), "refresh_token".to_string()]
}

fn default_response_types() -> Vec<String> {
    vec!["code".to_string()]
}

async fn register_client(
    State(db): State<DbClient>,
    State(rate_limit_state): State<RateLimitState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
    Json(req): Json<RegisterClientRequest>,
) -> ApiResult<impl IntoResponse> {
    let ip = crate::middleware::client_ip_from_headers(&headers, addr);
    let rl = rate_limit_state.charge_dcr_for(ip)?;
    if req.client_name.trim().is_empty() {
        return Err(ApiError::missing_field("client_name"));
    }
    if req.redirect_uris.is_empty() {
        return Err(ApiError::missing_field("redirect_uris"));
    }
    let (client, raw_secret) = oauth::register_client(
        &db,
        &req.client_name,
        &req.redirect_uris,
        &req.grant_types,
        &req.response_types,
        req.tenant_id,
    )
    .await?;
    Ok((rl.into_header_map(), ok(serde_json::json!({ "client": client, "client_secret": raw_secret }))))
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub client_id: OAuthClientId,
    pub redirect_uri: String,
    pub code_challenge: String,
    #[serde(default = "default_challenge_method")]
    pub code_challenge_method: String,
    pub state: String,
    #[serde(default)]
    pub scope: String,
}

fn default_challenge_method() -> String {
    "S256".to_string()
}

async fn authorize(
    State(state): State<AppState>,
    Query(params): Query<AuthorizeParams>,
) -> ApiResult<impl IntoResponse> {
    let pending = oauth::start_authorization(
        &state.db,
        params.client_id,
        &params.redirect_uri,
        &params.code_challenge,
        &params.code_challenge_method,
        &params.state,
        &params.scope,
        state.config.oauth.pending_auth_ttl_secs,
    )
    .await?;
    Ok(ok(pending))
}

#[derive(Debug, Deserialize)]
pub struct ConsentRequest {
    pub pending_id: PendingAuthId,
    pub user_id: TenantId,
    pub approve: bool,
}

/// `POST /oauth/consent`: the CLI/human approval step that turns a pending
/// authorization into an authorization code. Rejection simply leaves the
/// pending record to expire on its own TTL.
async fn consent(
    State(state): State<AppState>,
    Json(req): Json<ConsentRequest>,
) -> ApiResult<impl IntoResponse> {
    if !req.approve {
        return Err(ApiError::oauth_access_denied());
    }
    let (pending, code) =
        oauth::complete_authorization(&state.db, req.pending_id, req.user_id, state.config.oauth.auth_code_ttl_secs).await?;
    Ok(ok(serde_json::json!({
        "redirect_uri": pending.redirect_uri,
        "code": code,
        "state": pending.state,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "grant_type")]
#[serde(rename_all = "snake_case")]
pub enum TokenRequest {
    AuthorizationCode { code: String, client_id: OAuthClientId, redirect_uri: String, code_verifier: String },
    RefreshToken { refresh_token: String, client_id: OAuthClientId },
}

async fn token(State(state): State<AppState>, Json(req): Json<TokenRequest>) -> ApiResult<impl IntoResponse> {
    let access_ttl = state.config.oauth.access_token_ttl_secs;
    let refresh_ttl = state.config.oauth.refresh_token_ttl_secs;
    let (access_token, refresh_token, record) = match req {
        TokenRequest::AuthorizationCode { code, client_id, redirect_uri, code_verifier } => {
            oauth::exchange_authorization_code(&state.db, &code, client_id, &redirect_uri, &code_verifier, access_ttl, refresh_ttl)
                .await?
        }
        TokenRequest::RefreshToken { refresh_token, client_id } => {
            oauth::exchange_refresh_token(&state.db, &refresh_token, client_id, access_ttl, refresh_ttl).await?
        }
    };
    Ok(ok(serde_json::json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "token_type": "Bearer",
        "scope": record.scope,
        "expires_in": access_ttl,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub token: String,
}

async fn revoke(State(db): State<DbClient>, Json(req): Json<RevokeRequest>) -> ApiResult<impl IntoResponse> {
    oauth::revoke_token(&db, &req.token).await?;
    Ok(ok(serde_json::json!({})))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/.well-known/oauth-authorization-server", get(well_known_metadata))
        .route("/register", post(register_client))
        .route("/authorize", get(authorize))
        .route("/oauth/consent", post(consent))
        .route("/token", post(token))
        .route("/revoke", post(revoke))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_challenge_method_is_s256() {
        assert_eq!(default_challenge_method(), "S256");
    }

    #[test]
    fn test_default_grant_types() {
        let grants = default_grant_types();
        assert!(grants.contains(&"authorization_code".to_string()));
        assert!(grants.contains(&"refresh_token".to_string()));
        assert!(!grants.contains(&"implicit".to_string()));
    }

    #[test]
    fn test_token_request_tags_on_grant_type() {
        let json = r#"{"grant_type":"refresh_token","refresh_token":"abc","client_id":"00000000-0000-0000-0000-000000000000"}"#;
        let req: TokenRequest = serde_json::from_str(json).unwrap();
        assert!(matches!(req, TokenRequest::RefreshToken { .. }));
    }
}
