//! Identity types for switchyard entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ENTITY ID TYPE SYSTEM
// ============================================================================

/// Trait for type-safe entity IDs.
///
/// Ensures entity IDs cannot be accidentally mixed up across domains
/// (a `TaskId` can never be passed where a `MessageId` is expected).
pub trait EntityIdType:
    Copy
    + Clone
    + Eq
    + PartialEq
    + Hash
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The name of the entity type (e.g., "tenant", "task").
    const ENTITY_NAME: &'static str;

    /// Create a new ID from a UUID.
    fn new(uuid: Uuid) -> Self;

    /// Get the underlying UUID.
    fn as_uuid(&self) -> Uuid;

    /// Create a nil (all zeros) ID.
    fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    /// Create a new timestamp-sortable UUIDv7 ID.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// Create a new random UUIDv4 ID.
    fn new_v4() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Error type for parsing entity IDs from strings.
#[derive(Debug, Clone)]
pub struct EntityIdParseError {
    pub entity_name: &'static str,
    pub input: String,
    pub source: uuid::Error,
}

impl fmt::Display for EntityIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to parse {} id from '{}': {}",
            self.entity_name, self.input, self.source
        )
    }
}

impl std::error::Error for EntityIdParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Defines a type-safe entity ID newtype wrapping a UUID.
macro_rules! define_entity_id {
    ($name:ident, $entity:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s)
                    .map(Self::new)
                    .map_err(|e| EntityIdParseError {
                        entity_name: Self::ENTITY_NAME,
                        input: s.to_string(),
                        source: e,
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Uuid::deserialize(deserializer).map(Self::new)
            }
        }
    };
}

// ============================================================================
// ENTITY ID TYPES
// ============================================================================

define_entity_id!(TenantId, "tenant", "Type-safe ID for tenant entities.");
define_entity_id!(ApiKeyId, "api_key", "Type-safe ID for API key entities.");
define_entity_id!(TaskId, "task", "Type-safe ID for task entities.");
define_entity_id!(
    ClaimEventId,
    "claim_event",
    "Type-safe ID for claim event entities."
);
define_entity_id!(MessageId, "message", "Type-safe ID for relay message entities.");
define_entity_id!(SessionId, "session", "Type-safe ID for session entities.");
define_entity_id!(AuditId, "audit_entry", "Type-safe ID for audit log entities.");
define_entity_id!(LedgerId, "ledger_entry", "Type-safe ID for ledger entities.");
define_entity_id!(TraceId, "trace_span", "Type-safe ID for trace span entities.");
define_entity_id!(
    OAuthClientId,
    "oauth_client",
    "Type-safe ID for OAuth client entities."
);
define_entity_id!(
    PendingAuthId,
    "oauth_pending_authorization",
    "Type-safe ID for pending OAuth authorization entities."
);
define_entity_id!(
    OAuthTokenId,
    "oauth_token",
    "Type-safe ID for OAuth token entities."
);

// ============================================================================
// OTHER IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 hex digest, used as the storage key for opaque secrets
/// (API keys, authorization codes, OAuth tokens).
pub type SecretDigest = String;

/// Compute the hex-encoded SHA-256 digest of opaque secret material.
///
/// Used to key API keys, authorization codes, and OAuth tokens by hash so
/// the raw secret is never stored.
pub fn digest_secret(raw: &str) -> SecretDigest {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_type_safety() {
        let tenant_id = TenantId::now_v7();
        let task_id = TaskId::now_v7();
        assert_ne!(tenant_id.as_uuid(), task_id.as_uuid());
    }

    #[test]
    fn entity_id_display() {
        let id = TenantId::new(Uuid::nil());
        assert_eq!(
            format!("{:?}", id),
            "TenantId(00000000-0000-0000-0000-000000000000)"
        );
        assert_eq!(format!("{}", id), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn entity_id_from_str() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id: TenantId = uuid_str.parse().expect("valid uuid should parse");
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn entity_id_parse_error() {
        let result: Result<TenantId, _> = "invalid".parse();
        let err = result.unwrap_err();
        assert_eq!(err.entity_name, "tenant");
        assert_eq!(err.input, "invalid");
    }

    #[test]
    fn entity_id_serde_roundtrip() {
        let id = TaskId::now_v7();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with('"'));
        let deserialized: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn digest_is_stable_and_sha256() {
        let d1 = digest_secret("cb_abc123");
        let d2 = digest_secret("cb_abc123");
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64);
        assert_ne!(d1, digest_secret("cb_abc124"));
    }
}
