//! Enumerations shared across the task, relay, session, and OAuth domains.

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Task,
    Question,
    Dream,
    Sprint,
    SprintStory,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Task => "task",
            TaskType::Question => "question",
            TaskType::Dream => "dream",
            TaskType::Sprint => "sprint",
            TaskType::SprintStory => "sprint-story",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "task" => TaskType::Task,
            "question" => TaskType::Question,
            "dream" => TaskType::Dream,
            "sprint" => TaskType::Sprint,
            "sprint-story" => TaskType::SprintStory,
            _ => return None,
        })
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Active,
    Done,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Created => "created",
            TaskStatus::Active => "active",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl TaskStatus {
    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "created" => TaskStatus::Created,
            "active" => TaskStatus::Active,
            "done" => TaskStatus::Done,
            "failed" => TaskStatus::Failed,
            _ => return None,
        })
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionOutcome {
    Success,
    Failed,
    Skipped,
    Cancelled,
}

impl CompletionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionOutcome::Success => "SUCCESS",
            CompletionOutcome::Failed => "FAILED",
            CompletionOutcome::Skipped => "SKIPPED",
            CompletionOutcome::Cancelled => "CANCELLED",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "SUCCESS" => CompletionOutcome::Success,
            "FAILED" => CompletionOutcome::Failed,
            "SKIPPED" => CompletionOutcome::Skipped,
            "CANCELLED" => CompletionOutcome::Cancelled,
            _ => return None,
        })
    }
}

impl fmt::Display for CompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorClass {
    Timeout,
    Validation,
    Internal,
    Cancelled,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Timeout => "TIMEOUT",
            ErrorClass::Validation => "VALIDATION",
            ErrorClass::Internal => "INTERNAL",
            ErrorClass::Cancelled => "CANCELLED",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "TIMEOUT" => ErrorClass::Timeout,
            "VALIDATION" => ErrorClass::Validation,
            "INTERNAL" => ErrorClass::Internal,
            "CANCELLED" => ErrorClass::Cancelled,
            _ => return None,
        })
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclaimReason {
    Manual,
    Timeout,
    StaleRecovery,
}

impl UnclaimReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnclaimReason::Manual => "manual",
            UnclaimReason::Timeout => "timeout",
            UnclaimReason::StaleRecovery => "stale_recovery",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "manual" => UnclaimReason::Manual,
            "timeout" => UnclaimReason::Timeout,
            "stale_recovery" => UnclaimReason::StaleRecovery,
            _ => return None,
        })
    }
}

impl fmt::Display for UnclaimReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
    Claimed,
    Contention,
}

impl ClaimOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimOutcome::Claimed => "claimed",
            ClaimOutcome::Contention => "contention",
        }
    }
}

impl fmt::Display for ClaimOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Ping,
    Pong,
    Handshake,
    Directive,
    Status,
    Ack,
    Query,
    Result,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Ping => "PING",
            MessageType::Pong => "PONG",
            MessageType::Handshake => "HANDSHAKE",
            MessageType::Directive => "DIRECTIVE",
            MessageType::Status => "STATUS",
            MessageType::Ack => "ACK",
            MessageType::Query => "QUERY",
            MessageType::Result => "RESULT",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "PING" => MessageType::Ping,
            "PONG" => MessageType::Pong,
            "HANDSHAKE" => MessageType::Handshake,
            "DIRECTIVE" => MessageType::Directive,
            "STATUS" => MessageType::Status,
            "ACK" => MessageType::Ack,
            "QUERY" => MessageType::Query,
            "RESULT" => MessageType::Result,
            _ => return None,
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Delivered,
    Read,
    Failed,
    /// Aged out past its TTL without ever being delivered. Distinct from
    /// [`MessageStatus::DeadLetter`], which is reserved for messages that
    /// exhausted their bounded delivery attempts.
    Expired,
    DeadLetter,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
            MessageStatus::Expired => "expired",
            MessageStatus::DeadLetter => "dead_letter",
        };
        write!(f, "{s}")
    }
}

impl MessageStatus {
    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => MessageStatus::Pending,
            "delivered" => MessageStatus::Delivered,
            "read" => MessageStatus::Read,
            "failed" => MessageStatus::Failed,
            "expired" => MessageStatus::Expired,
            "dead_letter" => MessageStatus::DeadLetter,
            _ => return None,
        })
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "low" => Priority::Low,
            "normal" => Priority::Normal,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            _ => return None,
        })
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The compliance sub-state a session occupies. See
/// [`crate::compliance::transition`] for the transition function.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceState {
    PendingBoot,
    Compliant,
    Warned,
    Degraded,
    Derezzed,
}

impl fmt::Display for ComplianceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComplianceState::PendingBoot => "PENDING_BOOT",
            ComplianceState::Compliant => "COMPLIANT",
            ComplianceState::Warned => "WARNED",
            ComplianceState::Degraded => "DEGRADED",
            ComplianceState::Derezzed => "DEREZED",
        };
        write!(f, "{s}")
    }
}

impl ComplianceState {
    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "PENDING_BOOT" => ComplianceState::PendingBoot,
            "COMPLIANT" => ComplianceState::Compliant,
            "WARNED" => ComplianceState::Warned,
            "DEGRADED" => ComplianceState::Degraded,
            "DEREZED" => ComplianceState::Derezzed,
            _ => return None,
        })
    }
}

/// Events the compliance state machine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplianceEvent {
    /// One of the three boot tools was called (`got_program_state`, `got_tasks`, `got_messages`).
    BootCheckpoint(BootCheckpoint),
    /// `claim_task` succeeded; journaling begins (or continues).
    JournalingActivated,
    /// A non-exempt tool call was made while journaling is active.
    NonExemptToolCall,
    /// `update_program_state` was called.
    ProgramStateUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootCheckpoint {
    GotProgramState,
    GotTasks,
    GotMessages,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Blocked,
    Done,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Blocked => "blocked",
            SessionStatus::Done => "done",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "active" => SessionStatus::Active,
            "blocked" => SessionStatus::Blocked,
            "done" => SessionStatus::Done,
            _ => return None,
        })
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthTokenKind {
    Access,
    Refresh,
}

impl OAuthTokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthTokenKind::Access => "access",
            OAuthTokenKind::Refresh => "refresh",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "access" => OAuthTokenKind::Access,
            "refresh" => OAuthTokenKind::Refresh,
            _ => return None,
        })
    }
}

impl fmt::Display for OAuthTokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthClientAuthMethod {
    None,
    ClientSecretBasic,
    ClientSecretPost,
}

impl OAuthClientAuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthClientAuthMethod::None => "none",
            OAuthClientAuthMethod::ClientSecretBasic => "client_secret_basic",
            OAuthClientAuthMethod::ClientSecretPost => "client_secret_post",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "none" => OAuthClientAuthMethod::None,
            "client_secret_basic" => OAuthClientAuthMethod::ClientSecretBasic,
            "client_secret_post" => OAuthClientAuthMethod::ClientSecretPost,
            _ => return None,
        })
    }
}

impl fmt::Display for OAuthClientAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sliding-window rate-limit tiers assigned to API key records.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitTier {
    Standard,
    Elevated,
    Unlimited,
}

impl RateLimitTier {
    /// Requests allowed per sliding window for this tier.
    pub fn ceiling(self) -> u32 {
        match self {
            RateLimitTier::Standard => 120,
            RateLimitTier::Elevated => 600,
            RateLimitTier::Unlimited => u32::MAX,
        }
    }
}
