//! Authentication and rate-limiting middleware.
//!
//! Two independent concerns live here:
//! - `auth_middleware` resolves a bearer credential to an [`AuthContext`]
//!   and injects it into request extensions.
//! - `RateLimitState`/`rate_limit_middleware` enforce two sliding windows:
//!   a per (tenant, credential, tool) bucket sized by [`RateLimitTier`], and
//!   an IP-scoped brake on failed authentications that successful auth never
//!   charges.

use crate::auth::{authenticate, AuthContext};
use crate::config::AuthConfig;
use crate::db::DbClient;
use crate::error::ApiError;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ============================================================================
// AUTHENTICATION MIDDLEWARE
// ============================================================================

#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub db: DbClient,
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(db: DbClient, auth_config: Arc<AuthConfig>) -> Self {
        Self { db, auth_config }
    }
}

/// Pulls the bearer credential out of `Authorization` (stripping `Bearer `
/// if present) or, failing that, `x-api-key`.
fn extract_credential(request: &Request) -> Option<String> {
    if let Some(value) = request.headers().get("authorization").and_then(|h| h.to_str().ok()) {
        return Some(value.strip_prefix("Bearer ").unwrap_or(value).to_string());
    }
    request
        .headers()
        .get("x-api-key")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let credential = extract_credential(&request)
        .ok_or_else(|| AuthMiddlewareError(ApiError::unauthorized("Provide an Authorization or X-API-Key header")))?;

    let auth_context = authenticate(&state.db, &state.auth_config, &credential)
        .await
        .map_err(AuthMiddlewareError)?;

    request.extensions_mut().insert(auth_context);
    Ok(next.run(request).await)
}

#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

/// Typed extractor for handlers that want `AuthContext` without touching
/// request extensions directly. Requires `auth_middleware` upstream.
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "AuthContext missing; auth_middleware must run upstream of this route",
                ))
            })
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub fn extract_auth_context(request: &Request) -> Result<&AuthContext, ApiError> {
    request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::unauthorized("Auth context missing from request"))
}

pub fn extract_auth_context_owned(request: &Request) -> Result<AuthContext, ApiError> {
    extract_auth_context(request).cloned()
}

// ============================================================================
// SLIDING-WINDOW RATE LIMITER
// ============================================================================

/// Storage abstraction for sliding-window counting, so a distributed
/// (e.g. Redis-backed) implementation can replace the in-memory one without
/// touching `rate_limit_middleware`.
pub trait RateLimiter: Send + Sync {
    /// Records a hit for `key` and returns `Ok(remaining)` — hits left in
    /// the window after this one — if it falls within `ceiling` hits per
    /// `window`, or `Err(retry_after)` otherwise.
    fn check(&self, key: &str, ceiling: u32, window: Duration) -> Result<u32, Duration>;
}

/// Per-key sliding log of hit timestamps, pruned to the window on each call.
#[derive(Default)]
pub struct InMemoryRateLimiter {
    logs: DashMap<String, Mutex<VecDeque<Instant>>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check(&self, key: &str, ceiling: u32, window: Duration) -> Result<u32, Duration> {
        let entry = self.logs.entry(key.to_string()).or_default();
        let mut log = entry.lock().expect("rate limit log lock poisoned");
        let now = Instant::now();

        while let Some(&oldest) = log.front() {
            if now.duration_since(oldest) > window {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() as u32 >= ceiling {
            let retry_after = window.saturating_sub(now.duration_since(*log.front().unwrap()));
            return Err(retry_after.max(Duration::from_secs(1)));
        }

        log.push_back(now);
        Ok(ceiling - log.len() as u32)
    }
}

/// Applies both sliding windows from spec §4.2: a per (tenant, credential,
/// tool) bucket sized by the caller's [`RateLimitTier`], and an IP-scoped
/// brake on failed authentications. Successful auth never charges the IP
/// window, so offline attackers cannot distinguish unknown credentials from
/// valid-but-throttled ones.
#[derive(Clone)]
pub struct RateLimitState {
    enabled: bool,
    window: Duration,
    failed_auth_ip_window: Duration,
    failed_auth_ip_ceiling: u32,
    dcr_ip_window: Duration,
    dcr_ip_ceiling: u32,
    tool_limiter: Arc<dyn RateLimiter>,
    failed_auth_limiter: Arc<dyn RateLimiter>,
    dcr_limiter: Arc<dyn RateLimiter>,
}

impl RateLimitState {
    pub fn new(config: &crate::config::RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            window: config.window,
            failed_auth_ip_window: config.failed_auth_ip_window,
            failed_auth_ip_ceiling: config.failed_auth_ip_ceiling,
            dcr_ip_window: config.dcr_ip_window,
            dcr_ip_ceiling: config.dcr_ip_ceiling,
            tool_limiter: Arc::new(InMemoryRateLimiter::new()),
            failed_auth_limiter: Arc::new(InMemoryRateLimiter::new()),
            dcr_limiter: Arc::new(InMemoryRateLimiter::new()),
        }
    }

    /// Charges the IP-scoped failed-auth window. Called only on 401s.
    pub fn charge_failed_auth(&self, ip: IpAddr) -> Result<u32, Duration> {
        if !self.enabled {
            return Ok(u32::MAX);
        }
        self.failed_auth_limiter
            .check(&ip.to_string(), self.failed_auth_ip_ceiling, self.failed_auth_ip_window)
    }

    /// Charges the IP-scoped dynamic-client-registration window. DCR sits
    /// outside the bearer-auth stack, so this is the only brake on it.
    pub fn charge_dcr(&self, ip: IpAddr) -> Result<u32, Duration> {
        if !self.enabled {
            return Ok(u32::MAX);
        }
        self.dcr_limiter.check(&ip.to_string(), self.dcr_ip_ceiling, self.dcr_ip_window)
    }

    /// `charge_dcr` with the 429 mapping and header surfacing already done,
    /// for call sites that just want a response-ready result.
    pub fn charge_dcr_for(&self, ip: IpAddr) -> Result<RateLimitHeaders, ApiError> {
        match self.charge_dcr(ip) {
            Ok(remaining) => {
                Ok(RateLimitHeaders { limit: self.dcr_ip_ceiling, remaining, reset_secs: self.dcr_ip_window.as_secs() })
            }
            Err(retry_after) => Err(ApiError::too_many_requests(Some(retry_after.as_secs().max(1)))),
        }
    }

    /// Charges the per (tenant, credential, tool) bucket.
    pub fn charge_tool(&self, tenant_id: &str, credential_hash: &str, tool: &str, ceiling: u32) -> Result<u32, Duration> {
        if !self.enabled {
            return Ok(ceiling);
        }
        let key = format!("{tenant_id}:{credential_hash}:{tool}");
        self.tool_limiter.check(&key, ceiling, self.window)
    }

    /// Charges the tool bucket for an authenticated caller, deriving the
    /// ceiling from its [`RateLimitTier`](switchyard_core::RateLimitTier) and
    /// keying on its payload key rather than the raw credential. Returns the
    /// headers to attach to the response, or a 429 if the window is spent.
    pub fn charge_tool_for(&self, ctx: &AuthContext, tool: &str) -> Result<RateLimitHeaders, ApiError> {
        let ceiling = ctx.rate_limit_tier.ceiling();
        let credential_hash = hex::encode(ctx.payload_key);
        match self.charge_tool(&ctx.tenant_id.to_string(), &credential_hash, tool, ceiling) {
            Ok(remaining) => {
                Ok(RateLimitHeaders { limit: ceiling, remaining, reset_secs: self.window.as_secs() })
            }
            Err(retry_after) => Err(ApiError::too_many_requests(Some(retry_after.as_secs().max(1)))),
        }
    }
}

/// `X-RateLimit-*` headers for the per-(tenant,key,tool) bucket, surfaced on
/// every gated response so a well-behaved client can back off before it
/// gets a 429.
pub struct RateLimitHeaders {
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
}

impl RateLimitHeaders {
    pub fn into_header_map(self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_str(&self.limit.to_string()).expect("digits"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_str(&self.remaining.to_string()).expect("digits"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_str(&self.reset_secs.to_string()).expect("digits"));
        headers
    }
}

impl IntoResponse for RateLimitHeaders {
    fn into_response(self) -> Response {
        (self.into_header_map(), ()).into_response()
    }
}

pub struct RateLimitError {
    pub retry_after: Duration,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        ApiError::too_many_requests(Some(self.retry_after.as_secs().max(1))).into_response()
    }
}

/// Prefers `X-Forwarded-For`/`X-Real-IP` over the socket address so a
/// reverse-proxied deployment still rate-limits per real client.
pub(crate) fn client_ip_from_headers(headers: &HeaderMap, fallback: std::net::SocketAddr) -> IpAddr {
    if let Some(forwarded_for) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first_ip) = forwarded_for.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse() {
                return ip;
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        if let Ok(ip) = real_ip.trim().parse() {
            return ip;
        }
    }
    fallback.ip()
}

fn extract_client_ip(request: &Request, fallback: std::net::SocketAddr) -> IpAddr {
    client_ip_from_headers(request.headers(), fallback)
}

/// Runs the IP-scoped failed-auth brake. Must sit outside `auth_middleware`
/// in the layer stack (outer layers run first on the request) so a 401 from
/// auth is still observed and charged here via the response status.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<std::net::SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if !state.enabled {
        return Ok(next.run(request).await);
    }

    let ip = extract_client_ip(&request, addr);
    let response = next.run(request).await;

    if response.status() == StatusCode::UNAUTHORIZED {
        if let Err(retry_after) = state.charge_failed_auth(ip) {
            return Err(RateLimitError { retry_after });
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_limiter_allows_up_to_ceiling() {
        let limiter = InMemoryRateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("k", 5, Duration::from_secs(60)).is_ok());
        }
        assert!(limiter.check("k", 5, Duration::from_secs(60)).is_err());
    }

    #[test]
    fn in_memory_limiter_keys_are_independent() {
        let limiter = InMemoryRateLimiter::new();
        for _ in 0..3 {
            limiter.check("a", 3, Duration::from_secs(60)).unwrap();
        }
        assert!(limiter.check("a", 3, Duration::from_secs(60)).is_err());
        assert!(limiter.check("b", 3, Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn extract_client_ip_prefers_forwarded_for() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();
        let fallback = "127.0.0.1:0".parse().unwrap();
        assert_eq!(extract_client_ip(&req, fallback), "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn charge_dcr_is_per_ip_and_rejects_past_ceiling() {
        let mut config = crate::config::RateLimitConfig::default();
        config.dcr_ip_ceiling = 2;
        let state = RateLimitState::new(&config);
        let ip: IpAddr = "203.0.113.9".parse().unwrap();
        state.charge_dcr(ip).unwrap();
        state.charge_dcr(ip).unwrap();
        assert!(state.charge_dcr(ip).is_err());
        assert!(state.charge_dcr("203.0.113.10".parse().unwrap()).is_ok());
    }

    #[test]
    fn in_memory_limiter_reports_remaining_count() {
        let limiter = InMemoryRateLimiter::new();
        assert_eq!(limiter.check("k", 5, Duration::from_secs(60)).unwrap(), 4);
        assert_eq!(limiter.check("k", 5, Duration::from_secs(60)).unwrap(), 3);
    }

    fn test_ctx() -> AuthContext {
        AuthContext {
            tenant_id: switchyard_core::TenantId::now_v7(),
            program_id: "builder-1".to_string(),
            capabilities: vec!["dispatch.write".to_string()],
            rate_limit_tier: switchyard_core::RateLimitTier::Standard,
            oauth_scopes: None,
            payload_key: [7u8; 32],
            method: crate::auth::AuthMethod::ApiKey,
        }
    }

    #[test]
    fn charge_tool_for_reflects_tier_ceiling() {
        let state = RateLimitState::new(&crate::config::RateLimitConfig::default());
        let headers = state.charge_tool_for(&test_ctx(), "dispatch.write").unwrap();
        assert_eq!(headers.limit, switchyard_core::RateLimitTier::Standard.ceiling());
        assert_eq!(headers.remaining, headers.limit - 1);
    }

    #[test]
    fn charge_tool_for_rejects_once_ceiling_is_spent() {
        let mut config = crate::config::RateLimitConfig::default();
        config.window = Duration::from_secs(60);
        let state = RateLimitState::new(&config);
        let ctx = test_ctx();
        for _ in 0..switchyard_core::RateLimitTier::Standard.ceiling() {
            state.charge_tool_for(&ctx, "dispatch.write").unwrap();
        }
        assert!(state.charge_tool_for(&ctx, "dispatch.write").is_err());
    }
}
