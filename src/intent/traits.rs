//! Transport Client Trait Abstractions
//!
//! These traits let `IntentApi` run against `MockTransportClient` in tests and
//! against a real homeserver client in production.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Full user identifier (`@localpart:domain`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Derive the full identifier for a localpart on a homeserver domain
    pub fn new(localpart: &str, domain: &str) -> Self {
        Self(format!("@{}:{}", localpart, domain))
    }

    /// Localpart of this identifier, if it is well formed
    pub fn localpart(&self) -> Option<&str> {
        self.0.strip_prefix('@')?.split_once(':').map(|(local, _)| local)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room identifier or alias. Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Machine-readable error code carried by a `TransportError`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    Forbidden,
    UserInUse,
    Unknown,
    NotFound,
    LimitExceeded,
    NoTransactionId,
    NoBody,
    InvalidJson,
    /// Any code the core does not interpret
    Other(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Forbidden => "M_FORBIDDEN",
            Self::UserInUse => "M_USER_IN_USE",
            Self::Unknown => "M_UNKNOWN",
            Self::NotFound => "M_NOT_FOUND",
            Self::LimitExceeded => "M_LIMIT_EXCEEDED",
            Self::NoTransactionId => "NET.MAUNIUM.NO_TRANSACTION_ID",
            // Misspelling is part of the wire format.
            Self::NoBody => "NET.MAUNIUM.NO_REUQEST_BODY",
            Self::InvalidJson => "NET.MAUNIUM.INVALID_JSON",
            Self::Other(code) => code,
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "M_FORBIDDEN" => Self::Forbidden,
            "M_USER_IN_USE" => Self::UserInUse,
            "M_UNKNOWN" => Self::Unknown,
            "M_NOT_FOUND" => Self::NotFound,
            "M_LIMIT_EXCEEDED" => Self::LimitExceeded,
            "NET.MAUNIUM.NO_TRANSACTION_ID" => Self::NoTransactionId,
            "NET.MAUNIUM.NO_REUQEST_BODY" => Self::NoBody,
            "NET.MAUNIUM.INVALID_JSON" => Self::InvalidJson,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        Self::from(code.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by the transport
///
/// The status is carried out of band, so it is not part of the JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code} (HTTP {status}): {message}")]
pub struct TransportError {
    #[serde(skip, default = "default_status")]
    pub status: u16,
    #[serde(rename = "errcode")]
    pub code: ErrorCode,
    #[serde(rename = "error", alias = "message", default)]
    pub message: String,
}

fn default_status() -> u16 {
    500
}

impl TransportError {
    /// Build an error; codes given as `Other` are mapped to their known variant
    pub fn new(status: u16, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code: ErrorCode::from(code.as_str()),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, ErrorCode::Forbidden, message)
    }

    pub fn user_in_use(message: impl Into<String>) -> Self {
        Self::new(400, ErrorCode::UserInUse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, ErrorCode::NotFound, message)
    }

    pub fn limit_exceeded(message: impl Into<String>) -> Self {
        Self::new(429, ErrorCode::LimitExceeded, message)
    }

    pub fn is_forbidden(&self) -> bool {
        self.code.as_str() == ErrorCode::Forbidden.as_str()
    }

    pub fn is_user_in_use(&self) -> bool {
        self.code.as_str() == ErrorCode::UserInUse.as_str()
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
}

/// Join response. `room_id` is the resolved ID, even when joining by alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEventResponse {
    pub event_id: String,
}

/// Redaction request body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Homeserver client abstraction
///
/// One client is shared by every identity. Calls that act on behalf of a
/// user take the acting identity as `actor`; the implementation masquerades
/// as that user.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Register a new account with the given username (localpart)
    async fn register(&self, username: &str) -> TransportResult<RegisterResponse>;

    /// Join a room by ID or alias
    async fn join_room(&self, actor: &UserId, room: &RoomId) -> TransportResult<JoinResponse>;

    /// Invite `invitee` into `room`, acting as `actor`
    async fn invite_user(
        &self,
        actor: &UserId,
        room: &RoomId,
        invitee: &UserId,
    ) -> TransportResult<()>;

    async fn send_message_event(
        &self,
        actor: &UserId,
        room: &RoomId,
        event_type: &str,
        content: &Value,
    ) -> TransportResult<SendEventResponse>;

    /// Send a message event with an explicit origin timestamp (milliseconds)
    async fn send_massaged_message_event(
        &self,
        actor: &UserId,
        room: &RoomId,
        event_type: &str,
        content: &Value,
        ts: i64,
    ) -> TransportResult<SendEventResponse>;

    async fn send_state_event(
        &self,
        actor: &UserId,
        room: &RoomId,
        event_type: &str,
        state_key: &str,
        content: &Value,
    ) -> TransportResult<SendEventResponse>;

    /// Send a state event with an explicit origin timestamp (milliseconds)
    async fn send_massaged_state_event(
        &self,
        actor: &UserId,
        room: &RoomId,
        event_type: &str,
        state_key: &str,
        content: &Value,
        ts: i64,
    ) -> TransportResult<SendEventResponse>;

    async fn redact_event(
        &self,
        actor: &UserId,
        room: &RoomId,
        event_id: &str,
        request: &RedactRequest,
    ) -> TransportResult<SendEventResponse>;

    async fn set_display_name(&self, actor: &UserId, display_name: &str) -> TransportResult<()>;

    async fn set_avatar_url(&self, actor: &UserId, avatar_url: &str) -> TransportResult<()>;
}
