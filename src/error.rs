//! Error types.

use std::net::IpAddr;
use trust_dns_proto::error::ProtoError;

/// Error enumerates the possible Dyncrab error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a length prefix or payload can't be read off the wire as a
    /// complete frame. The [connection layer][crate::server] answers with a
    /// best-effort error response and closes the connection.
    #[error("framing error: {0}")]
    Framing(String),

    /// Returned when a frame's JSON payload is malformed or is missing one of the
    /// fields every registration/heartbeat message must carry (`version`, `type`,
    /// `hostname`, `timestamp`). The connection stays open.
    #[error("schema error: {0}")]
    Schema(String),

    /// Returned when a client submits a hostname that doesn't parse as a DNS name.
    #[error("\"{0}\" is not a valid hostname")]
    InvalidHostname(String),

    /// Returned when a client submits an `ip_address` value that doesn't parse as
    /// an IPv4 or IPv6 address.
    #[error("\"{0}\" is not a valid IP address")]
    InvalidIp(String),

    /// Returned when `exclude_private_ips` is set and a client tries to register
    /// an address from a private range (RFC 1918, or the [RFC 4193] `fc00::/7`
    /// unique local space).
    ///
    /// [RFC 4193]: https://www.rfc-editor.org/rfc/rfc4193.html
    #[error("private IP {0} is not permitted")]
    PrivateIp(IpAddr),

    /// Returned by [`HostStore::create_host`][crate::host_store::HostStore::create_host]
    /// when a record already exists for the hostname.
    #[error("host \"{0}\" is already registered")]
    DuplicateHost(String),

    /// Returned by host store lookups when no record exists for the hostname.
    #[error("host \"{0}\" not found")]
    HostNotFound(String),

    /// Returned when the host store fails for a reason other than a missing or
    /// duplicate row. The underlying cause is logged server-side, never sent to
    /// the client.
    #[error("host store failure: {0}")]
    Storage(String),

    /// Returned when `max_requests_per_minute` is configured and a hostname
    /// exceeds it. Carries the number of seconds until the window resets.
    #[error("rate limit exceeded for \"{hostname}\", retry after {retry_after}s")]
    RateLimited { hostname: String, retry_after: u64 },

    /// Returned when the [`Config::api_bind_addr`][`crate::config::Config::api_bind_addr`]
    /// is not a loopback address, or an address within a private network space.
    /// The status API is always intended to be used on private networks.
    #[error("API bind address ({0}) must be a loopback or private IP")]
    InsecureAPIBind(IpAddr),

    /// Returned when a configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when processing JSON from disk (e.g. loading a
    /// [`Config`][crate::config::Config] or a persisted host table) fails due to
    /// invalid JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),

    /// Returned when the embedded DNS authority encounters a generic DNS
    /// protocol error.
    #[error("DNS error")]
    DNSError(#[from] ProtoError),
}
