//! IP change tracking.
//!
//! Keeps a bounded, in-memory history of IP transitions per hostname and
//! answers queries over it. The history is deliberately not persisted: it is
//! an operational aid, lost on restart.
//!
//! The tracker is shared by every connection worker, so all access goes
//! through one lock around the event deque and the per-hostname current-IP
//! map. It is injected where needed rather than living in a process-wide
//! global.

use crate::config::IPV6_UNIQUE_LOCAL_NETWORK;
use crate::error::Error;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

/// How changes are spotted. There is a single path today (comparing a
/// registration message's IP against the stored one) but the field is kept on
/// every event so histories stay interpretable if more paths appear.
pub const DETECTION_IP_COMPARE: &str = "ip_compare";

/// One recorded IP transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpChangeEvent {
    pub hostname: String,
    pub previous_ip: IpAddr,
    pub new_ip: IpAddr,
    #[serde(with = "time::serde::rfc3339")]
    pub change_time: OffsetDateTime,
    pub change_reason: String,
    pub detection_method: String,
}

/// A detected (but not yet recorded) transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeDetection {
    pub previous_ip: IpAddr,
    pub new_ip: IpAddr,
}

/// Aggregate statistics over the recorded history.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackerStats {
    pub total_events: usize,
    pub unique_hosts: usize,
    pub ipv4_changes: usize,
    pub ipv6_changes: usize,
    pub private_targets: usize,
    pub public_targets: usize,
    pub by_reason: HashMap<String, usize>,
    pub last_hour: usize,
    pub last_day: usize,
}

#[derive(Debug)]
struct TrackerInner {
    events: VecDeque<IpChangeEvent>,
    current: HashMap<String, IpAddr>,
}

/// Thread-safe, bounded IP change history.
#[derive(Debug, Clone)]
pub struct IpChangeTracker {
    inner: Arc<RwLock<TrackerInner>>,
    max_entries: usize,
    exclude_private: bool,
}

impl IpChangeTracker {
    /// A tracker retaining at most `max_entries` events (oldest evicted
    /// first). When `exclude_private` is set, [`validate_ip`][Self::validate_ip]
    /// and [`check_ip_policy`][Self::check_ip_policy] reject private addresses.
    #[must_use]
    pub fn new(max_entries: usize, exclude_private: bool) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TrackerInner {
                events: VecDeque::with_capacity(max_entries.min(1024)),
                current: HashMap::new(),
            })),
            max_entries,
            exclude_private,
        }
    }

    /// Parse and policy-check a client-submitted IP string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIp`] for unparseable input and
    /// [`Error::PrivateIp`] when private addresses are excluded by
    /// configuration.
    pub fn validate_ip(&self, s: &str) -> Result<IpAddr, Error> {
        let ip: IpAddr = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidIp(s.to_string()))?;
        self.check_ip_policy(ip)?;
        Ok(ip)
    }

    /// Policy-check an already-parsed address (e.g. a TCP peer address).
    ///
    /// # Errors
    ///
    /// Returns [`Error::PrivateIp`] when private addresses are excluded by
    /// configuration.
    pub fn check_ip_policy(&self, ip: IpAddr) -> Result<(), Error> {
        if self.exclude_private && is_private(ip) {
            return Err(Error::PrivateIp(ip));
        }
        Ok(())
    }

    /// Align the tracker's notion of a hostname's current IP with the stored
    /// record, without logging an event.
    pub async fn record_ip(&self, hostname: &str, ip: IpAddr) {
        self.inner
            .write()
            .await
            .current
            .insert(hostname.to_string(), ip);
    }

    /// Compare `new_ip` against the hostname's known current IP. Returns
    /// `None` for unknown hostnames and for unchanged addresses.
    pub async fn detect_change(&self, hostname: &str, new_ip: IpAddr) -> Option<ChangeDetection> {
        let inner = self.inner.read().await;
        match inner.current.get(hostname) {
            Some(previous_ip) if *previous_ip != new_ip => Some(ChangeDetection {
                previous_ip: *previous_ip,
                new_ip,
            }),
            _ => None,
        }
    }

    /// Append a transition event, evicting the oldest entry once the cap is
    /// exceeded, and update the hostname's current IP.
    pub async fn log_change(
        &self,
        hostname: &str,
        previous_ip: IpAddr,
        new_ip: IpAddr,
        reason: &str,
    ) {
        let event = IpChangeEvent {
            hostname: hostname.to_string(),
            previous_ip,
            new_ip,
            change_time: OffsetDateTime::now_utc(),
            change_reason: reason.to_string(),
            detection_method: DETECTION_IP_COMPARE.to_string(),
        };
        let mut inner = self.inner.write().await;
        inner.current.insert(hostname.to_string(), new_ip);
        inner.events.push_back(event);
        while inner.events.len() > self.max_entries {
            inner.events.pop_front();
        }
    }

    /// Transitions recorded for one hostname, most recent first.
    pub async fn history(&self, hostname: &str, limit: Option<usize>) -> Vec<IpChangeEvent> {
        let inner = self.inner.read().await;
        let events = inner
            .events
            .iter()
            .rev()
            .filter(|e| e.hostname == hostname)
            .cloned();
        match limit {
            Some(limit) => events.take(limit).collect(),
            None => events.collect(),
        }
    }

    /// The most recent transitions across all hosts.
    pub async fn recent_changes(&self, limit: usize) -> Vec<IpChangeEvent> {
        self.inner
            .read()
            .await
            .events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Aggregate statistics across the retained history.
    pub async fn stats(&self) -> TrackerStats {
        let inner = self.inner.read().await;
        let now = OffsetDateTime::now_utc();
        let mut stats = TrackerStats {
            total_events: inner.events.len(),
            ..TrackerStats::default()
        };
        let mut hosts: HashMap<&str, ()> = HashMap::new();
        for event in &inner.events {
            hosts.entry(&event.hostname).or_insert(());
            match event.new_ip {
                IpAddr::V4(_) => stats.ipv4_changes += 1,
                IpAddr::V6(_) => stats.ipv6_changes += 1,
            }
            if is_private(event.new_ip) {
                stats.private_targets += 1;
            } else {
                stats.public_targets += 1;
            }
            *stats.by_reason.entry(event.change_reason.clone()).or_insert(0) += 1;
            let age = now - event.change_time;
            if age <= Duration::hours(1) {
                stats.last_hour += 1;
            }
            if age <= Duration::days(1) {
                stats.last_day += 1;
            }
        }
        stats.unique_hosts = hosts.len();
        stats
    }

    /// Drop a hostname's current-IP entry and its retained events. Called when
    /// a host record is deleted.
    pub async fn forget_host(&self, hostname: &str) {
        let mut inner = self.inner.write().await;
        inner.current.remove(hostname);
        inner.events.retain(|e| e.hostname != hostname);
    }
}

/// Loopback, RFC 1918, link-local and RFC 4193 unique-local space all count
/// as private here.
#[must_use]
pub fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || IPV6_UNIQUE_LOCAL_NETWORK.contains(IpAddr::V6(v6)),
    }
}
