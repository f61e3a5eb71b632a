//! Capability and scope gate (spec §4.3).
//!
//! Every tool declares a required capability string (`"relay.write"`). The
//! gate rejects when the caller's granted set does not contain it or the
//! wildcard `*`. OAuth callers additionally carry a granted scope set that
//! must cover the tool's scope family. Administrative tools are further
//! guarded by a program-class allow-list.

use crate::auth::AuthContext;
use crate::error::ApiError;

/// Scope families an OAuth-authenticated caller can hold.
pub const SCOPE_FULL: &str = "mcp:full";
pub const SCOPE_READ: &str = "mcp:read";
pub const SCOPE_WRITE: &str = "mcp:write";
pub const SCOPE_ADMIN: &str = "mcp:admin";

/// Program classes allowed to invoke administrative tools.
pub const ADMIN_PROGRAM_CLASSES: &[&str] = &["orchestrator", "admin", "legacy", "mobile"];

/// Rejects unless `ctx` carries `required` or the wildcard capability.
pub fn require_capability(ctx: &AuthContext, required: &str) -> Result<(), ApiError> {
    if ctx.capabilities.iter().any(|c| c == required || c == "*") {
        return Ok(());
    }
    Err(ApiError::forbidden(format!("missing required capability '{required}'")))
}

/// For OAuth-authenticated callers, requires the granted scope set to cover
/// one of `allowed_scopes`. Non-OAuth callers (API key, identity JWT) are
/// unaffected — scope enforcement only applies to OAuth access tokens.
pub fn require_scope(ctx: &AuthContext, allowed_scopes: &[&str]) -> Result<(), ApiError> {
    let Some(scopes) = &ctx.oauth_scopes else {
        return Ok(());
    };
    if scopes.iter().any(|s| s == SCOPE_FULL || allowed_scopes.contains(&s.as_str())) {
        return Ok(());
    }
    Err(ApiError::forbidden(format!(
        "OAuth token scope does not cover any of {allowed_scopes:?}"
    )))
}

/// Guards an administrative tool: the caller's program must be in the
/// allow-list regardless of its capability set.
pub fn require_admin_program_class(ctx: &AuthContext) -> Result<(), ApiError> {
    if ADMIN_PROGRAM_CLASSES.contains(&ctx.program_id.as_str()) {
        return Ok(());
    }
    Err(ApiError::forbidden(format!(
        "program '{}' is not in the administrative allow-list",
        ctx.program_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{RateLimitTier, TenantId};

    fn ctx(capabilities: Vec<&str>, program_id: &str, oauth_scopes: Option<Vec<&str>>) -> AuthContext {
        AuthContext {
            tenant_id: TenantId::now_v7(),
            program_id: program_id.to_string(),
            capabilities: capabilities.into_iter().map(str::to_string).collect(),
            rate_limit_tier: RateLimitTier::Standard,
            oauth_scopes: oauth_scopes.map(|v| v.into_iter().map(str::to_string).collect()),
            payload_key: [0u8; 32],
            method: crate::auth::AuthMethod::ApiKey,
        }
    }

    #[test]
    fn wildcard_capability_satisfies_any_requirement() {
        let c = ctx(vec!["*"], "orchestrator", None);
        assert!(require_capability(&c, "relay.write").is_ok());
    }

    #[test]
    fn missing_capability_is_forbidden() {
        let c = ctx(vec!["relay.read"], "orchestrator", None);
        assert!(require_capability(&c, "relay.write").is_err());
    }

    #[test]
    fn non_oauth_context_is_unaffected_by_scope_check() {
        let c = ctx(vec!["relay.write"], "orchestrator", None);
        assert!(require_scope(&c, &[SCOPE_WRITE]).is_ok());
    }

    #[test]
    fn oauth_scope_must_cover_the_tool() {
        let c = ctx(vec![], "oauth", Some(vec![SCOPE_READ]));
        assert!(require_scope(&c, &[SCOPE_WRITE]).is_err());
        assert!(require_scope(&c, &[SCOPE_READ, SCOPE_WRITE]).is_ok());
    }

    #[test]
    fn oauth_full_scope_covers_everything() {
        let c = ctx(vec![], "oauth", Some(vec![SCOPE_FULL]));
        assert!(require_scope(&c, &[SCOPE_ADMIN]).is_ok());
    }

    #[test]
    fn admin_program_class_allow_list() {
        let allowed = ctx(vec![], "admin", None);
        assert!(require_admin_program_class(&allowed).is_ok());

        let denied = ctx(vec![], "customer-widget", None);
        assert!(require_admin_program_class(&denied).is_err());
    }
}
