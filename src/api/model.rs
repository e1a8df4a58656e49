use crate::host_store::{Host, HostStatus};
use crate::monitor::MonitorStats;
use crate::tracker::{IpChangeEvent, TrackerStats};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Clone, Default)]
pub(super) struct HostsQuery {
    pub status: Option<HostStatus>,
    pub limit: Option<usize>,
}

#[derive(Serialize, Debug, Clone)]
pub(super) struct HostDetail {
    #[serde(flatten)]
    pub host: Host,
    pub ip_history: Vec<IpChangeEvent>,
}

#[derive(Serialize, Debug, Clone)]
pub(super) struct HostCounts {
    pub online: usize,
    pub offline: usize,
}

#[derive(Serialize, Debug, Clone)]
pub(super) struct StatsSummary {
    pub hosts: HostCounts,
    pub ip_changes: TrackerStats,
    pub heartbeat: MonitorStats,
}
