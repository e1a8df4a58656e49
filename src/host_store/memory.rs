use crate::error::Error;
use crate::host_store::{Host, HostStatus, HostStore};
use std::collections::HashMap;
use std::net::IpAddr;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// A non-durable [`HostStore`] backed by a `HashMap` behind a single
/// read/write lock. Each trait operation holds the lock for the whole
/// read-modify-write, so per-row updates are never torn.
#[derive(Default, Debug)]
pub struct InMemoryHostStore {
    hosts: RwLock<HashMap<String, Host>>,
}

impl InMemoryHostStore {
    /// Build a store from an existing host table (persisted state, tests).
    #[must_use]
    pub fn from_hosts(hosts: HashMap<String, Host>) -> Self {
        Self {
            hosts: RwLock::new(hosts),
        }
    }

    /// Replace a host record wholesale, bypassing the lifecycle operations.
    /// Used when loading persisted state and by tests that need to age a
    /// record's `last_seen`.
    pub async fn insert_host(&self, host: Host) {
        self.hosts.write().await.insert(host.hostname.clone(), host);
    }

    /// Clone the current host table.
    pub async fn snapshot(&self) -> HashMap<String, Host> {
        self.hosts.read().await.clone()
    }
}

#[async_trait::async_trait]
impl HostStore for InMemoryHostStore {
    async fn create_host(&self, hostname: &str, ip: IpAddr) -> Result<Host, Error> {
        let mut hosts = self.hosts.write().await;
        if hosts.contains_key(hostname) {
            return Err(Error::DuplicateHost(hostname.to_string()));
        }
        let host = Host::new(hostname, ip);
        hosts.insert(hostname.to_string(), host.clone());
        Ok(host)
    }

    async fn get_by_hostname(&self, hostname: &str) -> Result<Host, Error> {
        self.hosts
            .read()
            .await
            .get(hostname)
            .cloned()
            .ok_or_else(|| Error::HostNotFound(hostname.to_string()))
    }

    async fn update_ip(&self, hostname: &str, ip: IpAddr) -> Result<Host, Error> {
        let mut hosts = self.hosts.write().await;
        let host = hosts
            .get_mut(hostname)
            .ok_or_else(|| Error::HostNotFound(hostname.to_string()))?;
        let now = OffsetDateTime::now_utc();
        host.current_ip = ip;
        host.status = HostStatus::Online;
        host.last_seen = now;
        host.updated_at = now;
        Ok(host.clone())
    }

    async fn touch_last_seen(&self, hostname: &str) -> Result<Host, Error> {
        let mut hosts = self.hosts.write().await;
        let host = hosts
            .get_mut(hostname)
            .ok_or_else(|| Error::HostNotFound(hostname.to_string()))?;
        let now = OffsetDateTime::now_utc();
        host.status = HostStatus::Online;
        host.last_seen = now;
        host.updated_at = now;
        Ok(host.clone())
    }

    async fn mark_offline(&self, hostname: &str) -> Result<Host, Error> {
        let mut hosts = self.hosts.write().await;
        let host = hosts
            .get_mut(hostname)
            .ok_or_else(|| Error::HostNotFound(hostname.to_string()))?;
        if host.status != HostStatus::Offline {
            host.status = HostStatus::Offline;
            host.updated_at = OffsetDateTime::now_utc();
        }
        Ok(host.clone())
    }

    async fn list_by_status(
        &self,
        status: HostStatus,
        limit: Option<usize>,
    ) -> Result<Vec<Host>, Error> {
        let hosts = self.hosts.read().await;
        let mut matching: Vec<Host> = hosts
            .values()
            .filter(|h| h.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|h| h.last_seen);
        if let Some(limit) = limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn delete_host(&self, hostname: &str) -> Result<(), Error> {
        self.hosts
            .write()
            .await
            .remove(hostname)
            .map(|_| ())
            .ok_or_else(|| Error::HostNotFound(hostname.to_string()))
    }

    async fn count_by_status(&self, status: HostStatus) -> Result<usize, Error> {
        Ok(self
            .hosts
            .read()
            .await
            .values()
            .filter(|h| h.status == status)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn create_then_get_returns_submitted_ip() {
        let store = InMemoryHostStore::default();
        store.create_host("host1", ip("203.0.113.5")).await.unwrap();

        let host = store.get_by_hostname("host1").await.unwrap();
        assert_eq!(host.current_ip, ip("203.0.113.5"));
        assert_eq!(host.status, HostStatus::Online);
        assert_eq!(host.first_seen, host.last_seen);
    }

    #[tokio::test]
    async fn duplicate_create_rejected() {
        let store = InMemoryHostStore::default();
        store.create_host("host1", ip("203.0.113.5")).await.unwrap();

        let err = store.create_host("host1", ip("203.0.113.6")).await;
        assert!(matches!(err, Err(Error::DuplicateHost(_))));
    }

    #[tokio::test]
    async fn update_ip_refreshes_last_seen_and_status() {
        let store = InMemoryHostStore::default();
        let created = store.create_host("host1", ip("203.0.113.5")).await.unwrap();
        store.mark_offline("host1").await.unwrap();

        let updated = store.update_ip("host1", ip("203.0.113.6")).await.unwrap();
        assert_eq!(updated.current_ip, ip("203.0.113.6"));
        assert_eq!(updated.status, HostStatus::Online);
        assert!(updated.last_seen >= created.last_seen);
    }

    #[tokio::test]
    async fn touch_sets_host_online() {
        let store = InMemoryHostStore::default();
        store.create_host("host1", ip("203.0.113.5")).await.unwrap();
        store.mark_offline("host1").await.unwrap();

        let touched = store.touch_last_seen("host1").await.unwrap();
        assert_eq!(touched.status, HostStatus::Online);
        assert_eq!(touched.current_ip, ip("203.0.113.5"));
    }

    #[tokio::test]
    async fn mark_offline_is_idempotent() {
        let store = InMemoryHostStore::default();
        store.create_host("host1", ip("203.0.113.5")).await.unwrap();

        let first = store.mark_offline("host1").await.unwrap();
        let second = store.mark_offline("host1").await.unwrap();
        assert_eq!(first.status, HostStatus::Offline);
        // Second call is a no-op, not an error; nothing moved.
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn mark_offline_unknown_host_fails() {
        let store = InMemoryHostStore::default();
        let err = store.mark_offline("ghost").await;
        assert!(matches!(err, Err(Error::HostNotFound(_))));
    }

    #[tokio::test]
    async fn list_by_status_orders_and_limits() {
        let store = InMemoryHostStore::default();
        let now = OffsetDateTime::now_utc();
        for (name, age_secs) in [("a", 300), ("b", 100), ("c", 200)] {
            let mut host = Host::new(name, ip("203.0.113.5"));
            host.last_seen = now - time::Duration::seconds(age_secs);
            store.insert_host(host).await;
        }

        let all = store.list_by_status(HostStatus::Online, None).await.unwrap();
        let names: Vec<&str> = all.iter().map(|h| h.hostname.as_str()).collect();
        assert_eq!(names, ["a", "c", "b"]);

        let limited = store
            .list_by_status(HostStatus::Online, Some(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].hostname, "a");
    }

    #[tokio::test]
    async fn delete_and_count() {
        let store = InMemoryHostStore::default();
        store.create_host("host1", ip("203.0.113.5")).await.unwrap();
        store.create_host("host2", ip("203.0.113.6")).await.unwrap();
        store.mark_offline("host2").await.unwrap();

        assert_eq!(store.count_by_status(HostStatus::Online).await.unwrap(), 1);
        assert_eq!(store.count_by_status(HostStatus::Offline).await.unwrap(), 1);

        store.delete_host("host2").await.unwrap();
        assert_eq!(store.count_by_status(HostStatus::Offline).await.unwrap(), 0);
        assert!(matches!(
            store.delete_host("host2").await,
            Err(Error::HostNotFound(_))
        ));
    }
}
