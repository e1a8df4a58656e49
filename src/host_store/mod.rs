//! Host record storage.
//!
//! Supports a generic interface for creating and updating host records keyed
//! by hostname, consumed by the [registration manager][crate::registrar] and
//! the [heartbeat monitor][crate::monitor].
//!
//! Two implementations are provided, [`memory::InMemoryHostStore`] and
//! [`file::FileHostStore`]. The former is not durable across restarts. The
//! latter will write its state to disk for each update and load this state
//! again on startup.
//!
//! Every mutating operation is a single atomic row update: callers never
//! observe a host with a new IP but a stale `last_seen`, or vice versa.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use time::OffsetDateTime;

pub mod file;
pub mod memory;

#[allow(clippy::module_name_repetitions)]
pub use file::FileHostStore;
#[allow(clippy::module_name_repetitions)]
pub use memory::InMemoryHostStore;

/// `DynHostStore` is a type alias for a [`HostStore`] shared between the
/// connection workers and the background sweep loops.
#[allow(clippy::module_name_repetitions)]
pub type DynHostStore = Arc<dyn HostStore + Send + Sync>;

/// Host liveness status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Online,
    Offline,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostStatus::Online => f.write_str("online"),
            HostStatus::Offline => f.write_str("offline"),
        }
    }
}

/// A registered host.
///
/// Invariant: `status == Online` implies `last_seen` reflects the most recent
/// accepted registration or heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub hostname: String,
    pub current_ip: IpAddr,
    pub status: HostStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub first_seen: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Host {
    /// A fresh online record for a first-time registration.
    #[must_use]
    pub fn new(hostname: &str, ip: IpAddr) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            hostname: hostname.to_string(),
            current_ip: ip,
            status: HostStatus::Online,
            first_seen: now,
            last_seen: now,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An async trait describing transactional storage of [`Host`] records keyed
/// by hostname.
///
/// Implementations must serialize concurrent mutations of the same hostname;
/// mutations of distinct hostnames should not block each other beyond the
/// cost of the shared table lock.
#[async_trait::async_trait]
pub trait HostStore {
    /// Create a record for a first-time hostname, online with the given IP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateHost`] if a record already exists.
    async fn create_host(&self, hostname: &str, ip: IpAddr) -> Result<Host, Error>;

    /// Fetch the record for a hostname.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HostNotFound`] if no record exists.
    async fn get_by_hostname(&self, hostname: &str) -> Result<Host, Error>;

    /// Record an accepted registration carrying a new IP: updates the IP,
    /// refreshes `last_seen`, and sets the host online, atomically.
    async fn update_ip(&self, hostname: &str, ip: IpAddr) -> Result<Host, Error>;

    /// Record an accepted liveness proof: refreshes `last_seen` and sets the
    /// host online, atomically.
    async fn touch_last_seen(&self, hostname: &str) -> Result<Host, Error>;

    /// Transition a host to offline. Idempotent: re-marking an offline host
    /// succeeds and changes nothing.
    async fn mark_offline(&self, hostname: &str) -> Result<Host, Error>;

    /// List hosts with the given status, oldest `last_seen` first, up to
    /// `limit` entries when one is given.
    async fn list_by_status(
        &self,
        status: HostStatus,
        limit: Option<usize>,
    ) -> Result<Vec<Host>, Error>;

    /// Delete a host record. Destructive and irreversible.
    async fn delete_host(&self, hostname: &str) -> Result<(), Error>;

    /// Count hosts with the given status.
    async fn count_by_status(&self, status: HostStatus) -> Result<usize, Error>;
}
