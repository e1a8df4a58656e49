//! Dynamic zone state and the record-sync seam.
//!
//! The registration manager pushes `hostname -> IP` bindings through the
//! [`DnsSync`] trait; the [DNS handler][crate::dns] serves A/AAAA answers out
//! of the same [`ZoneStore`]. Swapping in an external DNS authority means
//! swapping the [`DnsSync`] implementation, nothing else.

use crate::error::Error;
use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use trust_dns_server::client::rr::{LowerName, Name};

/// `DynDnsSync` is a type alias for the record-sync collaborator shared by
/// the registration manager and the sweep loops.
#[allow(clippy::module_name_repetitions)]
pub type DynDnsSync = Arc<dyn DnsSync + Send + Sync>;

/// An async trait describing "point this hostname at this IP" against a DNS
/// authority. Callers treat it as fire-and-forget: failures are logged by the
/// caller, never surfaced to the registering client.
#[async_trait::async_trait]
pub trait DnsSync {
    /// Create or replace the address record for `hostname`.
    async fn upsert_record(&self, hostname: &str, ip: IpAddr) -> Result<(), Error>;

    /// Drop the address record for `hostname`, so the name stops resolving.
    async fn remove_record(&self, hostname: &str) -> Result<(), Error>;
}

/// In-process zone state: one address record per registered hostname, keyed
/// by FQDN under the configured origin.
#[derive(Debug, Clone)]
pub struct ZoneStore {
    origin: Name,
    records: Arc<RwLock<HashMap<LowerName, IpAddr>>>,
}

impl ZoneStore {
    #[must_use]
    pub fn new(origin: &LowerName) -> Self {
        Self {
            origin: origin.into(),
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Resolve a bare hostname to its FQDN under the zone origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHostname`] if the hostname doesn't parse as a
    /// DNS name or would not fit under the origin.
    pub fn fqdn(&self, hostname: &str) -> Result<LowerName, Error> {
        let name =
            Name::from_str(hostname).map_err(|_| Error::InvalidHostname(hostname.to_string()))?;
        let fqdn = name
            .append_domain(&self.origin)
            .map_err(|_| Error::InvalidHostname(hostname.to_string()))?;
        Ok(fqdn.into())
    }

    /// The address record for an FQDN, if one is registered.
    pub async fn lookup(&self, fqdn: &LowerName) -> Option<IpAddr> {
        self.records.read().await.get(fqdn).copied()
    }

    pub async fn contains(&self, fqdn: &LowerName) -> bool {
        self.records.read().await.contains_key(fqdn)
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait::async_trait]
impl DnsSync for ZoneStore {
    async fn upsert_record(&self, hostname: &str, ip: IpAddr) -> Result<(), Error> {
        let fqdn = self.fqdn(hostname)?;
        self.records.write().await.insert(fqdn, ip);
        Ok(())
    }

    async fn remove_record(&self, hostname: &str) -> Result<(), Error> {
        let fqdn = self.fqdn(hostname)?;
        self.records.write().await.remove(&fqdn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> ZoneStore {
        ZoneStore::new(&LowerName::from_str("dyn.example.com.").unwrap())
    }

    #[tokio::test]
    async fn upsert_then_lookup_under_origin() {
        let zone = zone();
        zone.upsert_record("host1", "203.0.113.5".parse().unwrap())
            .await
            .unwrap();

        let fqdn = LowerName::from_str("host1.dyn.example.com.").unwrap();
        assert_eq!(zone.lookup(&fqdn).await, Some("203.0.113.5".parse().unwrap()));
        assert_eq!(zone.record_count().await, 1);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_record() {
        let zone = zone();
        zone.upsert_record("host1", "203.0.113.5".parse().unwrap())
            .await
            .unwrap();
        zone.upsert_record("host1", "203.0.113.6".parse().unwrap())
            .await
            .unwrap();

        let fqdn = LowerName::from_str("host1.dyn.example.com.").unwrap();
        assert_eq!(zone.lookup(&fqdn).await, Some("203.0.113.6".parse().unwrap()));
        assert_eq!(zone.record_count().await, 1);
    }

    #[tokio::test]
    async fn remove_stops_resolution() {
        let zone = zone();
        zone.upsert_record("host1", "203.0.113.5".parse().unwrap())
            .await
            .unwrap();
        zone.remove_record("host1").await.unwrap();

        let fqdn = LowerName::from_str("host1.dyn.example.com.").unwrap();
        assert!(zone.lookup(&fqdn).await.is_none());
    }

    #[tokio::test]
    async fn invalid_hostname_rejected() {
        let zone = zone();
        let err = zone
            .upsert_record("no spaces allowed", "203.0.113.5".parse().unwrap())
            .await;
        assert!(matches!(err, Err(Error::InvalidHostname(_))));
    }
}
