//! Host registration lifecycle.
//!
//! One hostname is always in one of three states: absent, online, or
//! offline. Every accepted registration or heartbeat drives it to online,
//! and exactly one of four things happens on the way:
//!
//! | Current state | IP comparison | Outcome               |
//! |---------------|---------------|-----------------------|
//! | absent        | —             | `created`             |
//! | online        | same IP       | `updated_timestamp`   |
//! | online        | different IP  | `updated_ip`          |
//! | offline       | same IP       | `reactivated`         |
//! | offline       | different IP  | `reactivated`         |
//!
//! Reactivation and online-IP-change end in the same state but stay separate
//! outcomes on the wire: only reactivation reports a `previous_status`, and
//! response consumers key off its presence.
//!
//! The manager never reports success without a durable store update, and it
//! signals the DNS collaborator after (not during) the row update, so a slow
//! DNS path can't extend the row's critical section.

use crate::dns::DynDnsSync;
use crate::error::Error;
use crate::host_store::{DynHostStore, Host, HostStatus};
use crate::tracker::IpChangeTracker;
use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use trust_dns_server::client::rr::Name;

/// Change reason recorded for an IP change accepted while online.
pub const REASON_REGISTRATION: &str = "registration";
/// Change reason recorded for an IP change accepted on reactivation.
pub const REASON_REACTIVATION: &str = "reactivation";

const RATE_WINDOW: Duration = Duration::seconds(60);

/// What a registration message did to the host's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationAction {
    Created,
    UpdatedIp,
    UpdatedTimestamp,
    Reactivated,
    Error,
}

/// Per-message outcome returned to the connection layer.
#[derive(Debug, Clone, Serialize)]
pub struct HostRegistrationResult {
    pub success: bool,
    pub action: RegistrationAction,
    pub hostname: String,
    pub ip_address: IpAddr,
    pub previous_ip: Option<IpAddr>,
    /// Populated only when the host was offline before this message.
    pub previous_status: Option<HostStatus>,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Outcome of transitioning a batch of hostnames offline. A failing hostname
/// never aborts the batch; it is reported and retried on the next sweep.
#[derive(Debug, Clone, Default)]
pub struct OfflineBatchOutcome {
    pub marked: Vec<String>,
    pub failed: Vec<String>,
}

/// Fixed-window per-hostname request budget.
#[derive(Debug)]
struct RateLimiter {
    max_per_window: u32,
    windows: Mutex<HashMap<String, (OffsetDateTime, u32)>>,
}

impl RateLimiter {
    fn new(max_per_window: u32) -> Self {
        Self {
            max_per_window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    async fn check(&self, hostname: &str) -> Result<(), Error> {
        let now = OffsetDateTime::now_utc();
        let mut windows = self.windows.lock().await;
        if windows.len() > 1024 {
            windows.retain(|_, (start, _)| now - *start < RATE_WINDOW);
        }
        let (start, count) = windows
            .entry(hostname.to_string())
            .or_insert((now, 0));
        if now - *start >= RATE_WINDOW {
            *start = now;
            *count = 0;
        }
        *count += 1;
        if *count > self.max_per_window {
            let retry_after = (RATE_WINDOW - (now - *start)).whole_seconds().max(1);
            return Err(Error::RateLimited {
                hostname: hostname.to_string(),
                retry_after: u64::try_from(retry_after).unwrap_or(1),
            });
        }
        Ok(())
    }
}

/// The registration lifecycle state machine, orchestrating the host store,
/// the IP change tracker and the DNS collaborator.
pub struct HostRegistrar {
    store: DynHostStore,
    dns: DynDnsSync,
    tracker: IpChangeTracker,
    limiter: Option<RateLimiter>,
}

impl HostRegistrar {
    #[must_use]
    pub fn new(
        store: DynHostStore,
        dns: DynDnsSync,
        tracker: IpChangeTracker,
        max_requests_per_minute: Option<u32>,
    ) -> Self {
        Self {
            store,
            dns,
            tracker,
            limiter: max_requests_per_minute.map(RateLimiter::new),
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &IpChangeTracker {
        &self.tracker
    }

    /// Apply one registration or heartbeat message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHostname`], [`Error::PrivateIp`] or
    /// [`Error::RateLimited`] for requests rejected before touching storage.
    /// Storage failures are not errors at this level: they come back as an
    /// unsuccessful result with [`RegistrationAction::Error`], so the caller
    /// can always map the outcome straight to a wire response.
    pub async fn process_message(
        &self,
        hostname: &str,
        ip: IpAddr,
    ) -> Result<HostRegistrationResult, Error> {
        validate_hostname(hostname)?;
        self.tracker.check_ip_policy(ip)?;
        if let Some(limiter) = &self.limiter {
            limiter.check(hostname).await?;
        }

        match self.store.get_by_hostname(hostname).await {
            Ok(host) => Ok(self.apply_existing(host, ip).await),
            Err(Error::HostNotFound(_)) => match self.store.create_host(hostname, ip).await {
                Ok(host) => {
                    self.tracker.record_ip(hostname, host.current_ip).await;
                    self.sync_dns(hostname, ip).await;
                    info!(hostname, ip = %ip, "registered new host");
                    Ok(result(
                        RegistrationAction::Created,
                        hostname,
                        ip,
                        None,
                        None,
                        format!("host '{hostname}' created with IP {ip}"),
                    ))
                }
                // Lost a create race: the hostname appeared between the lookup
                // and the insert. Re-read and continue down the update path
                // rather than assuming the store retries for us.
                Err(Error::DuplicateHost(_)) => match self.store.get_by_hostname(hostname).await {
                    Ok(host) => Ok(self.apply_existing(host, ip).await),
                    Err(err) => Ok(self.storage_failure(hostname, ip, &err)),
                },
                Err(err) => Ok(self.storage_failure(hostname, ip, &err)),
            },
            Err(err) => Ok(self.storage_failure(hostname, ip, &err)),
        }
    }

    async fn apply_existing(&self, host: Host, new_ip: IpAddr) -> HostRegistrationResult {
        let hostname = host.hostname.as_str();
        let was_offline = host.status == HostStatus::Offline;
        self.tracker.record_ip(hostname, host.current_ip).await;

        if let Some(change) = self.tracker.detect_change(hostname, new_ip).await {
            if let Err(err) = self.store.update_ip(hostname, new_ip).await {
                return self.storage_failure(hostname, new_ip, &err);
            }
            let reason = if was_offline {
                REASON_REACTIVATION
            } else {
                REASON_REGISTRATION
            };
            self.tracker
                .log_change(hostname, change.previous_ip, new_ip, reason)
                .await;
            self.sync_dns(hostname, new_ip).await;

            if was_offline {
                info!(hostname, previous_ip = %change.previous_ip, ip = %new_ip,
                    "host reactivated with new IP");
                result(
                    RegistrationAction::Reactivated,
                    hostname,
                    new_ip,
                    Some(change.previous_ip),
                    Some(HostStatus::Offline),
                    format!("host '{hostname}' reactivated with IP {new_ip}"),
                )
            } else {
                info!(hostname, previous_ip = %change.previous_ip, ip = %new_ip, "host IP updated");
                result(
                    RegistrationAction::UpdatedIp,
                    hostname,
                    new_ip,
                    Some(change.previous_ip),
                    None,
                    format!(
                        "host '{hostname}' IP updated from {} to {new_ip}",
                        change.previous_ip
                    ),
                )
            }
        } else {
            if let Err(err) = self.store.touch_last_seen(hostname).await {
                return self.storage_failure(hostname, new_ip, &err);
            }

            if was_offline {
                // The record dropped off the zone when the host went offline;
                // coming back online it has to resolve again.
                self.sync_dns(hostname, new_ip).await;
                info!(hostname, ip = %new_ip, "host reactivated");
                result(
                    RegistrationAction::Reactivated,
                    hostname,
                    new_ip,
                    None,
                    Some(HostStatus::Offline),
                    format!("host '{hostname}' reactivated with IP {new_ip}"),
                )
            } else {
                result(
                    RegistrationAction::UpdatedTimestamp,
                    hostname,
                    new_ip,
                    None,
                    None,
                    format!("heartbeat refreshed for host '{hostname}'"),
                )
            }
        }
    }

    /// Transition the given hostnames to offline, dropping their DNS records.
    /// Idempotent per hostname and tolerant of individual failures.
    pub async fn mark_hosts_offline(&self, hostnames: &[String]) -> OfflineBatchOutcome {
        let mut outcome = OfflineBatchOutcome::default();
        for hostname in hostnames {
            match self.store.mark_offline(hostname).await {
                Ok(_) => {
                    if let Err(err) = self.dns.remove_record(hostname).await {
                        warn!(hostname, error = %err, "failed to drop DNS record for offline host");
                    }
                    info!(hostname, "host marked offline");
                    outcome.marked.push(hostname.clone());
                }
                Err(err) => {
                    warn!(hostname, error = %err, "failed to mark host offline");
                    outcome.failed.push(hostname.clone());
                }
            }
        }
        outcome
    }

    /// Delete hosts that have been offline longer than `older_than_days`.
    /// Destructive: the record, its DNS entry and its tracked history all go.
    ///
    /// # Errors
    ///
    /// Returns an error only if the offline host list can't be read;
    /// per-host delete failures are logged and skipped.
    pub async fn cleanup_offline_hosts(&self, older_than_days: u32) -> Result<Vec<String>, Error> {
        let cutoff = OffsetDateTime::now_utc() - Duration::days(i64::from(older_than_days));
        let offline = self.store.list_by_status(HostStatus::Offline, None).await?;

        let mut removed = Vec::new();
        for host in offline.into_iter().filter(|h| h.last_seen < cutoff) {
            match self.store.delete_host(&host.hostname).await {
                Ok(()) => {
                    if let Err(err) = self.dns.remove_record(&host.hostname).await {
                        warn!(hostname = %host.hostname, error = %err,
                            "failed to drop DNS record for deleted host");
                    }
                    self.tracker.forget_host(&host.hostname).await;
                    info!(hostname = %host.hostname, last_seen = %host.last_seen,
                        "deleted long-offline host");
                    removed.push(host.hostname);
                }
                Err(err) => {
                    warn!(hostname = %host.hostname, error = %err,
                        "failed to delete long-offline host");
                }
            }
        }
        Ok(removed)
    }

    /// Fetch a host record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HostNotFound`] for unknown hostnames.
    pub async fn lookup(&self, hostname: &str) -> Result<Host, Error> {
        self.store.get_by_hostname(hostname).await
    }

    /// List hosts with the given status, oldest `last_seen` first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list_by_status(
        &self,
        status: HostStatus,
        limit: Option<usize>,
    ) -> Result<Vec<Host>, Error> {
        self.store.list_by_status(status, limit).await
    }

    /// Count hosts with the given status.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn count_by_status(&self, status: HostStatus) -> Result<usize, Error> {
        self.store.count_by_status(status).await
    }

    /// Whether a record exists for the hostname.
    ///
    /// # Errors
    ///
    /// Propagates store failures other than a missing row.
    pub async fn host_exists(&self, hostname: &str) -> Result<bool, Error> {
        match self.store.get_by_hostname(hostname).await {
            Ok(_) => Ok(true),
            Err(Error::HostNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Delete a single host and its DNS record and tracked history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HostNotFound`] for unknown hostnames.
    pub async fn delete_host(&self, hostname: &str) -> Result<(), Error> {
        self.store.delete_host(hostname).await?;
        if let Err(err) = self.dns.remove_record(hostname).await {
            warn!(hostname, error = %err, "failed to drop DNS record for deleted host");
        }
        self.tracker.forget_host(hostname).await;
        Ok(())
    }

    fn storage_failure(
        &self,
        hostname: &str,
        ip: IpAddr,
        err: &Error,
    ) -> HostRegistrationResult {
        error!(hostname, error = %err, "host store failure");
        let mut res = result(
            RegistrationAction::Error,
            hostname,
            ip,
            None,
            None,
            "host store operation failed".to_string(),
        );
        res.success = false;
        res
    }

    async fn sync_dns(&self, hostname: &str, ip: IpAddr) {
        // Fire-and-forget from the client's point of view: the registration
        // already succeeded durably, a sync failure only delays resolution.
        if let Err(err) = self.dns.upsert_record(hostname, ip).await {
            warn!(hostname, ip = %ip, error = %err, "DNS record sync failed");
        }
    }
}

fn result(
    action: RegistrationAction,
    hostname: &str,
    ip: IpAddr,
    previous_ip: Option<IpAddr>,
    previous_status: Option<HostStatus>,
    message: String,
) -> HostRegistrationResult {
    HostRegistrationResult {
        success: !matches!(action, RegistrationAction::Error),
        action,
        hostname: hostname.to_string(),
        ip_address: ip,
        previous_ip,
        previous_status,
        message,
        timestamp: OffsetDateTime::now_utc(),
    }
}

/// A registrable hostname parses as a relative DNS name: non-empty, at most
/// 253 bytes, no trailing dot.
///
/// # Errors
///
/// Returns [`Error::InvalidHostname`] otherwise.
pub fn validate_hostname(hostname: &str) -> Result<(), Error> {
    if hostname.is_empty() || hostname.len() > 253 {
        return Err(Error::InvalidHostname(hostname.to_string()));
    }
    let name =
        Name::from_str(hostname).map_err(|_| Error::InvalidHostname(hostname.to_string()))?;
    if name.is_fqdn() || name.is_root() || name.is_wildcard() {
        return Err(Error::InvalidHostname(hostname.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::ZoneStore;
    use crate::host_store::{HostStore, InMemoryHostStore};
    use std::sync::Arc;
    use trust_dns_server::client::rr::LowerName;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn zone() -> ZoneStore {
        ZoneStore::new(&LowerName::from_str("dyn.example.com.").unwrap())
    }

    fn registrar_with(store: DynHostStore, zone: ZoneStore) -> HostRegistrar {
        HostRegistrar::new(
            store,
            Arc::new(zone),
            IpChangeTracker::new(100, false),
            None,
        )
    }

    fn registrar() -> (HostRegistrar, Arc<InMemoryHostStore>, ZoneStore) {
        let store = Arc::new(InMemoryHostStore::default());
        let zone = zone();
        (
            registrar_with(store.clone(), zone.clone()),
            store,
            zone,
        )
    }

    /// A store that fails every operation, for exercising the error path.
    struct BrokenStore;

    #[async_trait::async_trait]
    impl HostStore for BrokenStore {
        async fn create_host(&self, _: &str, _: IpAddr) -> Result<Host, Error> {
            Err(Error::Storage("down".into()))
        }
        async fn get_by_hostname(&self, _: &str) -> Result<Host, Error> {
            Err(Error::Storage("down".into()))
        }
        async fn update_ip(&self, _: &str, _: IpAddr) -> Result<Host, Error> {
            Err(Error::Storage("down".into()))
        }
        async fn touch_last_seen(&self, _: &str) -> Result<Host, Error> {
            Err(Error::Storage("down".into()))
        }
        async fn mark_offline(&self, _: &str) -> Result<Host, Error> {
            Err(Error::Storage("down".into()))
        }
        async fn list_by_status(
            &self,
            _: HostStatus,
            _: Option<usize>,
        ) -> Result<Vec<Host>, Error> {
            Err(Error::Storage("down".into()))
        }
        async fn delete_host(&self, _: &str) -> Result<(), Error> {
            Err(Error::Storage("down".into()))
        }
        async fn count_by_status(&self, _: HostStatus) -> Result<usize, Error> {
            Err(Error::Storage("down".into()))
        }
    }

    #[tokio::test]
    async fn first_registration_creates_online_host() {
        let (registrar, store, zone) = registrar();

        let res = registrar
            .process_message("alice", ip("10.0.0.1"))
            .await
            .unwrap();
        assert!(res.success);
        assert_eq!(res.action, RegistrationAction::Created);
        assert!(res.previous_ip.is_none());
        assert!(res.previous_status.is_none());

        let host = store.get_by_hostname("alice").await.unwrap();
        assert_eq!(host.current_ip, ip("10.0.0.1"));
        assert_eq!(host.status, HostStatus::Online);
        // The name resolves immediately.
        assert!(zone.contains(&zone.fqdn("alice").unwrap()).await);
    }

    #[tokio::test]
    async fn same_ip_refreshes_timestamp_only() {
        let (registrar, store, _) = registrar();
        registrar
            .process_message("alice", ip("10.0.0.1"))
            .await
            .unwrap();
        let before = store.get_by_hostname("alice").await.unwrap();

        let res = registrar
            .process_message("alice", ip("10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(res.action, RegistrationAction::UpdatedTimestamp);
        assert!(res.previous_ip.is_none());
        assert!(res.previous_status.is_none());

        let after = store.get_by_hostname("alice").await.unwrap();
        assert_eq!(after.current_ip, ip("10.0.0.1"));
        assert!(after.last_seen >= before.last_seen);
        // No change event for an unchanged IP.
        assert!(registrar.tracker().history("alice", None).await.is_empty());
    }

    #[tokio::test]
    async fn different_ip_while_online_is_updated_ip() {
        let (registrar, store, zone) = registrar();
        registrar
            .process_message("alice", ip("10.0.0.1"))
            .await
            .unwrap();

        let res = registrar
            .process_message("alice", ip("10.0.0.2"))
            .await
            .unwrap();
        assert_eq!(res.action, RegistrationAction::UpdatedIp);
        assert_eq!(res.previous_ip, Some(ip("10.0.0.1")));
        // Not a reactivation, so no previous_status.
        assert!(res.previous_status.is_none());

        assert_eq!(
            store.get_by_hostname("alice").await.unwrap().current_ip,
            ip("10.0.0.2")
        );
        let history = registrar.tracker().history("alice", None).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].previous_ip, ip("10.0.0.1"));
        assert_eq!(history[0].new_ip, ip("10.0.0.2"));
        assert_eq!(history[0].change_reason, REASON_REGISTRATION);
        assert_eq!(
            zone.lookup(&zone.fqdn("alice").unwrap()).await,
            Some(ip("10.0.0.2"))
        );
    }

    #[tokio::test]
    async fn offline_same_ip_is_reactivation() {
        let (registrar, store, zone) = registrar();
        registrar
            .process_message("alice", ip("10.0.0.1"))
            .await
            .unwrap();
        registrar
            .mark_hosts_offline(&["alice".to_string()])
            .await;
        assert!(!zone.contains(&zone.fqdn("alice").unwrap()).await);

        let res = registrar
            .process_message("alice", ip("10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(res.action, RegistrationAction::Reactivated);
        assert!(res.previous_ip.is_none());
        assert_eq!(res.previous_status, Some(HostStatus::Offline));

        assert_eq!(
            store.get_by_hostname("alice").await.unwrap().status,
            HostStatus::Online
        );
        // Resolution is restored.
        assert!(zone.contains(&zone.fqdn("alice").unwrap()).await);
    }

    #[tokio::test]
    async fn offline_new_ip_is_reactivation_with_change_event() {
        let (registrar, store, _) = registrar();
        registrar
            .process_message("alice", ip("10.0.0.1"))
            .await
            .unwrap();
        registrar
            .mark_hosts_offline(&["alice".to_string()])
            .await;

        let res = registrar
            .process_message("alice", ip("10.0.0.2"))
            .await
            .unwrap();
        assert_eq!(res.action, RegistrationAction::Reactivated);
        assert_eq!(res.previous_ip, Some(ip("10.0.0.1")));
        assert_eq!(res.previous_status, Some(HostStatus::Offline));

        assert_eq!(
            store.get_by_hostname("alice").await.unwrap().current_ip,
            ip("10.0.0.2")
        );
        let history = registrar.tracker().history("alice", None).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].change_reason, REASON_REACTIVATION);
    }

    #[tokio::test]
    async fn storage_failure_is_unsuccessful_error_action() {
        let registrar = registrar_with(Arc::new(BrokenStore), zone());

        let res = registrar
            .process_message("alice", ip("10.0.0.1"))
            .await
            .unwrap();
        assert!(!res.success);
        assert_eq!(res.action, RegistrationAction::Error);
        // The store's failure detail stays out of the result message.
        assert!(!res.message.contains("down"));
    }

    #[tokio::test]
    async fn invalid_hostnames_rejected_before_storage() {
        let (registrar, store, _) = registrar();
        for bad in ["", "no spaces", "trailing.dot.", "*"] {
            let err = registrar.process_message(bad, ip("10.0.0.1")).await;
            assert!(matches!(err, Err(Error::InvalidHostname(_))), "{bad:?}");
        }
        assert_eq!(store.count_by_status(HostStatus::Online).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn private_ip_rejected_when_excluded() {
        let store: DynHostStore = Arc::new(InMemoryHostStore::default());
        let registrar = HostRegistrar::new(
            store,
            Arc::new(zone()),
            IpChangeTracker::new(100, true),
            None,
        );

        let err = registrar.process_message("alice", ip("192.168.1.5")).await;
        assert!(matches!(err, Err(Error::PrivateIp(_))));
    }

    #[tokio::test]
    async fn rate_limit_kicks_in_past_budget() {
        let store: DynHostStore = Arc::new(InMemoryHostStore::default());
        let registrar = HostRegistrar::new(
            store,
            Arc::new(zone()),
            IpChangeTracker::new(100, false),
            Some(2),
        );

        registrar
            .process_message("alice", ip("10.0.0.1"))
            .await
            .unwrap();
        registrar
            .process_message("alice", ip("10.0.0.1"))
            .await
            .unwrap();
        let err = registrar.process_message("alice", ip("10.0.0.1")).await;
        match err {
            Err(Error::RateLimited {
                hostname,
                retry_after,
            }) => {
                assert_eq!(hostname, "alice");
                assert!(retry_after >= 1 && retry_after <= 60);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
        // Other hostnames are unaffected.
        registrar
            .process_message("bob", ip("10.0.0.2"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn offline_batch_reports_per_host_failures() {
        let (registrar, _, _) = registrar();
        registrar
            .process_message("alice", ip("10.0.0.1"))
            .await
            .unwrap();

        let outcome = registrar
            .mark_hosts_offline(&["alice".to_string(), "ghost".to_string()])
            .await;
        assert_eq!(outcome.marked, vec!["alice".to_string()]);
        assert_eq!(outcome.failed, vec!["ghost".to_string()]);

        // Re-marking is a no-op success, not a failure.
        let again = registrar
            .mark_hosts_offline(&["alice".to_string()])
            .await;
        assert_eq!(again.marked, vec!["alice".to_string()]);
        assert!(again.failed.is_empty());
    }

    #[tokio::test]
    async fn cleanup_deletes_only_long_offline_hosts() {
        let (registrar, store, zone) = registrar();
        registrar
            .process_message("old", ip("10.0.0.1"))
            .await
            .unwrap();
        registrar
            .process_message("fresh", ip("10.0.0.2"))
            .await
            .unwrap();
        registrar
            .mark_hosts_offline(&["old".to_string(), "fresh".to_string()])
            .await;

        // Age "old" past the cutoff by rewriting its record.
        let mut aged = store.get_by_hostname("old").await.unwrap();
        aged.last_seen = OffsetDateTime::now_utc() - Duration::days(45);
        store.insert_host(aged).await;

        let removed = registrar.cleanup_offline_hosts(30).await.unwrap();
        assert_eq!(removed, vec!["old".to_string()]);
        assert!(!registrar.host_exists("old").await.unwrap());
        assert!(registrar.host_exists("fresh").await.unwrap());
        assert!(!zone.contains(&zone.fqdn("old").unwrap()).await);
    }

    #[test]
    fn hostname_validation_accepts_labels_and_subdomains() {
        validate_hostname("host1").unwrap();
        validate_hostname("web-01.rack2").unwrap();
        assert!(validate_hostname(&"x".repeat(300)).is_err());
    }
}
