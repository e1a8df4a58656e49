use crate::error::Error;
use crate::host_store::{DynHostStore, FileHostStore, InMemoryHostStore};
use crate::response::ResponseDetail;
use ipnetwork::IpNetwork;
use lazy_static::lazy_static;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_server::client::rr::LowerName;

pub type SharedConfig = Arc<Config>;

/// Immutable service configuration, loaded once at startup.
#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Zone the registered hostnames live under (e.g. `dyn.example.com`).
    pub domain: LowerName,
    pub ns_domain: LowerName,
    pub ns_admin: String,
    /// Registration protocol listener (length-prefixed JSON over TCP).
    pub bind_addr: SocketAddr,
    pub api_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_api_timeout")]
    pub api_timeout: Duration,
    pub dns_udp_bind_addr: SocketAddr,
    pub dns_tcp_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_dns_tcp_timeout")]
    pub dns_tcp_timeout: Duration,
    /// TTL served on A/AAAA answers. Kept low so IP changes propagate.
    #[serde(default = "default_dns_ttl")]
    pub dns_ttl: u32,

    /// Interval clients are told to heartbeat at; one term of the timeout
    /// threshold `heartbeat_interval * timeout_multiplier + grace_period`.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: Duration,
    #[serde(default = "default_timeout_multiplier")]
    pub timeout_multiplier: u32,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_grace_period")]
    pub grace_period: Duration,
    /// How often the timeout sweep runs.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_check_interval")]
    pub check_interval: Duration,
    #[serde(default = "default_max_hosts_per_check")]
    pub max_hosts_per_check: usize,
    /// How often the long-offline cleanup sweep runs.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: Duration,
    /// Hosts offline longer than this many days are deleted by the cleanup
    /// sweep. Destructive and irreversible.
    #[serde(default = "default_cleanup_offline_after_days")]
    pub cleanup_offline_after_days: u32,

    /// Cap on the in-memory IP change history (oldest evicted first).
    #[serde(default = "default_max_history_entries")]
    pub max_history_entries: usize,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    #[serde(default)]
    pub response_detail: ResponseDetail,
    /// When set, registrations from private address space are rejected.
    #[serde(default)]
    pub exclude_private_ips: bool,
    /// Per-hostname registration budget. `None` disables rate limiting.
    #[serde(default)]
    pub max_requests_per_minute: Option<u32>,
    /// When set, the host table is persisted to this JSON file after each
    /// mutation and reloaded on startup.
    #[serde(default)]
    pub host_store_state_path: Option<String>,
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_dns_tcp_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_dns_ttl() -> u32 {
    60
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_timeout_multiplier() -> u32 {
    2
}

fn default_grace_period() -> Duration {
    Duration::from_secs(30)
}

fn default_check_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_max_hosts_per_check() -> usize {
    1000
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_cleanup_offline_after_days() -> u32 {
    30
}

fn default_max_history_entries() -> usize {
    1000
}

fn default_max_message_size() -> usize {
    64 * 1024
}

lazy_static! {
    // NOTE(XXX): Once the "ip" feature has stabilized we can use Ipv6Addr.is_unique_local[0].
    //            Presently this feature is unstable so we home-roll. See also RFC 4193[1].
    // [0]: https://doc.rust-lang.org/std/net/struct.Ipv6Addr.html#method.is_unique_local
    // [1]: https://www.rfc-editor.org/rfc/rfc4193.html
    pub(crate) static ref IPV6_UNIQUE_LOCAL_NETWORK: IpNetwork =
        IpNetwork::from_str("fc00::/7").unwrap();
}

impl Config {
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.bind_addr_is_secure()?;
        conf.knobs_in_range()?;
        Ok(conf)
    }

    /// Build the configured host store: file-backed when
    /// `host_store_state_path` is set, in-memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] or [`Error::InvalidJSON`] if a configured state
    /// file exists but can't be read or parsed.
    pub async fn host_store(&self) -> Result<DynHostStore, Error> {
        Ok(match &self.host_store_state_path {
            Some(p) => Arc::new(FileHostStore::try_from_file(p).await?),
            None => Arc::new(InMemoryHostStore::default()),
        })
    }

    /// Silence window after which an online host is considered timed out:
    /// `heartbeat_interval * timeout_multiplier + grace_period`.
    #[must_use]
    pub fn timeout_threshold(&self) -> Duration {
        self.heartbeat_interval * self.timeout_multiplier + self.grace_period
    }

    fn bind_addr_is_secure(&self) -> Result<(), Error> {
        match self.api_bind_addr {
            SocketAddr::V4(v4_addr) => {
                let ip = v4_addr.ip();
                if !ip.is_loopback() && !ip.is_private() {
                    return Err(Error::InsecureAPIBind(IpAddr::V4(*ip)));
                }
                Ok(())
            }
            SocketAddr::V6(v6_addr) => {
                let ip = v6_addr.ip();
                if !ip.is_loopback() && !IPV6_UNIQUE_LOCAL_NETWORK.contains(IpAddr::V6(*ip)) {
                    return Err(Error::InsecureAPIBind(IpAddr::V6(*ip)));
                }
                Ok(())
            }
        }
    }

    fn knobs_in_range(&self) -> Result<(), Error> {
        if self.timeout_multiplier == 0 {
            return Err(Error::InvalidConfig("timeout_multiplier cannot be 0".into()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(Error::InvalidConfig("heartbeat_interval cannot be 0".into()));
        }
        if self.check_interval.is_zero() {
            return Err(Error::InvalidConfig("check_interval cannot be 0".into()));
        }
        if self.max_hosts_per_check == 0 {
            return Err(Error::InvalidConfig("max_hosts_per_check cannot be 0".into()));
        }
        if self.max_history_entries == 0 {
            return Err(Error::InvalidConfig("max_history_entries cannot be 0".into()));
        }
        if self.cleanup_offline_after_days == 0 {
            return Err(Error::InvalidConfig(
                "cleanup_offline_after_days cannot be 0".into(),
            ));
        }
        if self.max_requests_per_minute == Some(0) {
            return Err(Error::InvalidConfig(
                "max_requests_per_minute cannot be 0".into(),
            ));
        }
        Ok(())
    }
}
