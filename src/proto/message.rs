use crate::host_store::HostStatus;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Protocol version carried in every message and response.
pub const PROTOCOL_VERSION: &str = "1.0";

/// The `type` value carried by every outbound response.
pub const RESPONSE_TYPE: &str = "response";

/// Inbound message kinds. A `registration` is used both for first contact and
/// for signaling a possible IP change; a `heartbeat` proves liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Registration,
    Heartbeat,
}

/// An inbound registration or heartbeat message.
///
/// `timestamp` is informational; the server uses its own clock for
/// `last_seen`. `ip_address` optionally overrides the TCP peer address as the
/// address to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub hostname: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl Message {
    /// A registration message stamped with the current time.
    #[must_use]
    pub fn registration(hostname: &str) -> Self {
        Self::new(MessageKind::Registration, hostname)
    }

    /// A heartbeat message stamped with the current time.
    #[must_use]
    pub fn heartbeat(hostname: &str) -> Self {
        Self::new(MessageKind::Heartbeat, hostname)
    }

    fn new(kind: MessageKind, hostname: &str) -> Self {
        // NB: unwrap is safe: RFC 3339 formatting of the current UTC time
        // cannot fail.
        let timestamp = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap();
        Self {
            version: PROTOCOL_VERSION.to_string(),
            kind,
            hostname: hostname.to_string(),
            timestamp,
            ip_address: None,
        }
    }
}

/// Outcome discriminator on success responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    NewRegistration,
    IpChange,
    HeartbeatUpdate,
    Reconnection,
}

/// Outcome discriminator on error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    FramingError,
    SchemaError,
    ValidationError,
    DatabaseError,
    RateLimitError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Optional server identification block included at `full` response detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub server_version: String,
    pub protocol_version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }
}

/// An outbound response. Construct these through the
/// [`ResponseBuilder`][crate::response::ResponseBuilder], which guarantees the
/// required fields are populated and the optional ones match the configured
/// detail level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub version: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub status: ResponseStatus,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_type: Option<ResultType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_ip: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<HostStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ServerInfo>,
}
