//! Heartbeat timeout engine.
//!
//! A host that stops heartbeating is only discovered here: the sweep loop
//! periodically pulls online hosts, compares their `last_seen` against
//! `now - (heartbeat_interval * timeout_multiplier + grace_period)` and
//! transitions the silent ones to offline. A second, much slower loop deletes
//! hosts that have stayed offline past the configured age.
//!
//! Both loops run for the life of the process, swallow per-iteration errors,
//! and stop promptly when the shutdown signal fires. A sweep can also be
//! driven by hand ([`HeartbeatMonitor::run_sweep`]), which is how the tests
//! exercise it.

use crate::config::SharedConfig;
use crate::registrar::HostRegistrar;
use crate::host_store::HostStatus;
use crate::error::Error;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, error, info};

/// Sweep durations kept for the rolling average.
const DURATION_SAMPLES: usize = 100;

/// What one timeout check found, before any status was changed.
#[derive(Debug, Clone)]
pub struct TimeoutResult {
    pub hosts_checked: usize,
    pub hosts_timed_out: usize,
    pub timed_out_hosts: Vec<String>,
    pub check_duration: Duration,
}

/// What one full sweep (check + offline transitions) did.
#[derive(Debug, Clone)]
pub struct StatusChangeResult {
    pub hosts_checked: usize,
    pub hosts_timed_out: usize,
    pub timed_out_hosts: Vec<String>,
    pub check_duration: Duration,
    pub hosts_marked_offline: usize,
    pub failed_hosts: Vec<String>,
    pub success: bool,
}

/// Running totals across the life of the monitor.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorStats {
    pub total_sweeps: u64,
    pub total_timeouts: u64,
    /// Rolling average over the last [`DURATION_SAMPLES`] sweeps.
    pub average_sweep_duration_ms: f64,
    pub total_cleanups: u64,
    pub hosts_cleaned: u64,
}

#[derive(Debug, Default)]
struct StatsInner {
    total_sweeps: u64,
    total_timeouts: u64,
    durations: VecDeque<Duration>,
    total_cleanups: u64,
    hosts_cleaned: u64,
}

/// Periodic liveness sweeps over the host table.
#[derive(Clone)]
pub struct HeartbeatMonitor {
    registrar: Arc<HostRegistrar>,
    config: SharedConfig,
    stats: Arc<RwLock<StatsInner>>,
}

impl HeartbeatMonitor {
    #[must_use]
    pub fn new(registrar: Arc<HostRegistrar>, config: SharedConfig) -> Self {
        Self {
            registrar,
            config,
            stats: Arc::new(RwLock::new(StatsInner::default())),
        }
    }

    /// Find online hosts whose `last_seen` predates the timeout cutoff.
    /// Checks at most `max_hosts_per_check` hosts, oldest first, and changes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Propagates a host store failure listing online hosts.
    pub async fn check_timeouts(&self) -> Result<TimeoutResult, Error> {
        let started = Instant::now();
        let cutoff = OffsetDateTime::now_utc() - self.config.timeout_threshold();

        let online = self
            .registrar
            .list_by_status(HostStatus::Online, Some(self.config.max_hosts_per_check))
            .await?;

        let timed_out_hosts: Vec<String> = online
            .iter()
            .filter(|host| host.last_seen < cutoff)
            .map(|host| host.hostname.clone())
            .collect();

        Ok(TimeoutResult {
            hosts_checked: online.len(),
            hosts_timed_out: timed_out_hosts.len(),
            timed_out_hosts,
            check_duration: started.elapsed(),
        })
    }

    /// One full sweep: check timeouts, then transition exactly the reported
    /// hostnames to offline. Individual failures are reported per hostname
    /// and retried naturally on the next sweep.
    pub async fn run_sweep(&self) -> StatusChangeResult {
        let checked = match self.check_timeouts().await {
            Ok(result) => result,
            Err(err) => {
                error!(error = %err, "timeout check failed, will retry next sweep");
                return StatusChangeResult {
                    hosts_checked: 0,
                    hosts_timed_out: 0,
                    timed_out_hosts: Vec::new(),
                    check_duration: Duration::ZERO,
                    hosts_marked_offline: 0,
                    failed_hosts: Vec::new(),
                    success: false,
                };
            }
        };

        let outcome = self
            .registrar
            .mark_hosts_offline(&checked.timed_out_hosts)
            .await;

        {
            let mut stats = self.stats.write().await;
            stats.total_sweeps += 1;
            stats.total_timeouts += checked.hosts_timed_out as u64;
            stats.durations.push_back(checked.check_duration);
            while stats.durations.len() > DURATION_SAMPLES {
                stats.durations.pop_front();
            }
        }

        if checked.hosts_timed_out > 0 {
            info!(
                checked = checked.hosts_checked,
                timed_out = checked.hosts_timed_out,
                failed = outcome.failed.len(),
                "sweep transitioned silent hosts offline"
            );
        } else {
            debug!(checked = checked.hosts_checked, "sweep found no silent hosts");
        }

        StatusChangeResult {
            hosts_checked: checked.hosts_checked,
            hosts_timed_out: checked.hosts_timed_out,
            timed_out_hosts: checked.timed_out_hosts,
            check_duration: checked.check_duration,
            hosts_marked_offline: outcome.marked.len(),
            success: outcome.failed.is_empty(),
            failed_hosts: outcome.failed,
        }
    }

    /// One cleanup pass: delete hosts offline longer than
    /// `cleanup_offline_after_days`.
    pub async fn run_cleanup_once(&self) -> Vec<String> {
        match self
            .registrar
            .cleanup_offline_hosts(self.config.cleanup_offline_after_days)
            .await
        {
            Ok(removed) => {
                let mut stats = self.stats.write().await;
                stats.total_cleanups += 1;
                stats.hosts_cleaned += removed.len() as u64;
                drop(stats);
                if !removed.is_empty() {
                    info!(removed = removed.len(), "cleanup deleted long-offline hosts");
                }
                removed
            }
            Err(err) => {
                error!(error = %err, "cleanup pass failed, will retry next interval");
                Vec::new()
            }
        }
    }

    /// Sweep loop. Runs until `shutdown` fires; an iteration never takes the
    /// loop down.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        info!(
            interval_secs = self.config.check_interval.as_secs(),
            threshold_secs = self.config.timeout_threshold().as_secs(),
            "heartbeat monitor started"
        );
        loop {
            tokio::select! {
                () = tokio::time::sleep(self.config.check_interval) => {
                    self.run_sweep().await;
                }
                () = shutdown.notified() => {
                    debug!("heartbeat monitor shutting down");
                    return;
                }
            }
        }
    }

    /// Cleanup loop. Runs until `shutdown` fires.
    pub async fn run_cleanup(&self, shutdown: Arc<Notify>) {
        info!(
            interval_secs = self.config.cleanup_interval.as_secs(),
            offline_after_days = self.config.cleanup_offline_after_days,
            "offline cleanup loop started"
        );
        loop {
            tokio::select! {
                () = tokio::time::sleep(self.config.cleanup_interval) => {
                    self.run_cleanup_once().await;
                }
                () = shutdown.notified() => {
                    debug!("offline cleanup loop shutting down");
                    return;
                }
            }
        }
    }

    /// Snapshot of the running totals.
    pub async fn stats(&self) -> MonitorStats {
        let stats = self.stats.read().await;
        let average_sweep_duration_ms = if stats.durations.is_empty() {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let sum_ms: f64 = stats
                .durations
                .iter()
                .map(|d| d.as_secs_f64() * 1000.0)
                .sum();
            sum_ms / stats.durations.len() as f64
        };
        MonitorStats {
            total_sweeps: stats.total_sweeps,
            total_timeouts: stats.total_timeouts,
            average_sweep_duration_ms,
            total_cleanups: stats.total_cleanups,
            hosts_cleaned: stats.hosts_cleaned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::ZoneStore;
    use crate::host_store::{Host, HostStore, InMemoryHostStore};
    use crate::tracker::IpChangeTracker;
    use std::net::IpAddr;
    use std::str::FromStr;
    use trust_dns_server::client::rr::LowerName;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn test_config(overrides: serde_json::Value) -> SharedConfig {
        let mut base = serde_json::json!({
            "domain": "dyn.example.com",
            "ns_domain": "ns1.example.com",
            "ns_admin": "dns-admin@example.com",
            "bind_addr": "127.0.0.1:4580",
            "api_bind_addr": "127.0.0.1:3000",
            "dns_udp_bind_addr": "127.0.0.1:5353",
            "dns_tcp_bind_addr": "127.0.0.1:5353",
            "heartbeat_interval": 60,
            "timeout_multiplier": 2,
            "grace_period": 30,
        });
        base.as_object_mut()
            .unwrap()
            .extend(overrides.as_object().unwrap().clone());
        Arc::new(serde_json::from_value(base).unwrap())
    }

    fn monitor_with(
        config: SharedConfig,
    ) -> (HeartbeatMonitor, Arc<InMemoryHostStore>, Arc<HostRegistrar>) {
        let store = Arc::new(InMemoryHostStore::default());
        let zone = ZoneStore::new(&LowerName::from_str("dyn.example.com.").unwrap());
        let registrar = Arc::new(HostRegistrar::new(
            store.clone(),
            Arc::new(zone),
            IpChangeTracker::new(100, false),
            None,
        ));
        (
            HeartbeatMonitor::new(registrar.clone(), config),
            store,
            registrar,
        )
    }

    async fn insert_aged(store: &InMemoryHostStore, hostname: &str, age_secs: i64) {
        let mut host = Host::new(hostname, ip("203.0.113.5"));
        host.last_seen = OffsetDateTime::now_utc() - time::Duration::seconds(age_secs);
        store.insert_host(host).await;
    }

    #[tokio::test]
    async fn timeout_law_boundary() {
        // threshold = 60 * 2 + 30 = 150s
        let (monitor, store, _) = monitor_with(test_config(serde_json::json!({})));
        insert_aged(&store, "silent", 151).await;
        insert_aged(&store, "alive", 149).await;

        let result = monitor.check_timeouts().await.unwrap();
        assert_eq!(result.hosts_checked, 2);
        assert_eq!(result.hosts_timed_out, 1);
        assert_eq!(result.timed_out_hosts, vec!["silent".to_string()]);
    }

    #[tokio::test]
    async fn check_does_not_change_status() {
        let (monitor, store, _) = monitor_with(test_config(serde_json::json!({})));
        insert_aged(&store, "silent", 500).await;

        monitor.check_timeouts().await.unwrap();
        assert_eq!(
            store.get_by_hostname("silent").await.unwrap().status,
            HostStatus::Online
        );
    }

    #[tokio::test]
    async fn sweep_transitions_exactly_the_reported_hosts() {
        let (monitor, store, _) = monitor_with(test_config(serde_json::json!({})));
        insert_aged(&store, "silent", 500).await;
        insert_aged(&store, "alive", 10).await;

        let result = monitor.run_sweep().await;
        assert!(result.success);
        assert_eq!(result.hosts_marked_offline, 1);
        assert!(result.failed_hosts.is_empty());

        assert_eq!(
            store.get_by_hostname("silent").await.unwrap().status,
            HostStatus::Offline
        );
        assert_eq!(
            store.get_by_hostname("alive").await.unwrap().status,
            HostStatus::Online
        );
    }

    #[tokio::test]
    async fn repeated_sweeps_are_idempotent() {
        let (monitor, store, _) = monitor_with(test_config(serde_json::json!({})));
        insert_aged(&store, "silent", 500).await;

        let first = monitor.run_sweep().await;
        assert_eq!(first.hosts_marked_offline, 1);

        // Now offline, so the host no longer shows up as checked or timed out.
        let second = monitor.run_sweep().await;
        assert!(second.success);
        assert_eq!(second.hosts_timed_out, 0);
        assert_eq!(second.hosts_marked_offline, 0);
    }

    #[tokio::test]
    async fn sweep_respects_max_hosts_per_check() {
        let config = test_config(serde_json::json!({ "max_hosts_per_check": 2 }));
        let (monitor, store, _) = monitor_with(config);
        for name in ["a", "b", "c"] {
            insert_aged(&store, name, 500).await;
        }

        let first = monitor.run_sweep().await;
        assert_eq!(first.hosts_checked, 2);
        assert_eq!(first.hosts_marked_offline, 2);

        // The remainder is picked up by the following sweep.
        let second = monitor.run_sweep().await;
        assert_eq!(second.hosts_marked_offline, 1);
    }

    #[tokio::test]
    async fn stats_accumulate_across_sweeps() {
        let (monitor, store, _) = monitor_with(test_config(serde_json::json!({})));
        insert_aged(&store, "silent", 500).await;

        monitor.run_sweep().await;
        monitor.run_sweep().await;

        let stats = monitor.stats().await;
        assert_eq!(stats.total_sweeps, 2);
        assert_eq!(stats.total_timeouts, 1);
        assert!(stats.average_sweep_duration_ms >= 0.0);
    }

    #[tokio::test]
    async fn cleanup_counts_deleted_hosts() {
        let config = test_config(serde_json::json!({ "cleanup_offline_after_days": 30 }));
        let (monitor, store, registrar) = monitor_with(config);

        insert_aged(&store, "ancient", 40 * 24 * 60 * 60).await;
        registrar
            .mark_hosts_offline(&["ancient".to_string()])
            .await;
        // mark_offline doesn't touch last_seen, so the record stays aged.

        let removed = monitor.run_cleanup_once().await;
        assert_eq!(removed, vec!["ancient".to_string()]);

        let stats = monitor.stats().await;
        assert_eq!(stats.total_cleanups, 1);
        assert_eq!(stats.hosts_cleaned, 1);
    }
}
