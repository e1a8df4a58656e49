//! Dyncrab
//!
//! Dynamic DNS for a fleet of self-registering hosts. Clients announce their
//! current IP address under a hostname over a small length-prefixed JSON
//! protocol ([`proto`]) and keep the registration alive with periodic
//! heartbeats; a background sweep ([`monitor`]) flips silent hosts to offline
//! and eventually deletes long-gone ones. An embedded authoritative DNS
//! server ([`dns`]) answers `A`/`AAAA` queries for every registered hostname,
//! so `<hostname>.<domain>` always resolves to the host's last reported
//! address.
//!
//! The lifecycle itself lives in [`registrar`]: create on first contact,
//! update on IP change, refresh on heartbeat, reactivate on return from
//! offline. IP transitions are kept in a bounded in-memory history
//! ([`tracker`]) queryable through the read-only [HTTP API][api].
//!
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
#[doc(hidden)]
pub mod crab;
pub mod dns;
pub mod error;
pub mod host_store;
pub mod monitor;
pub mod proto;
pub mod registrar;
pub mod response;
pub mod server;
pub mod tracker;

pub use api::new as new_http;
pub use config::{Config, SharedConfig};
pub use dns::new as new_dns;
pub use dns::ZoneStore;
pub use host_store::{FileHostStore, InMemoryHostStore};
pub use monitor::HeartbeatMonitor;
pub use registrar::HostRegistrar;
pub use response::ResponseBuilder;
pub use server::RegistrationServer;
pub use tracker::IpChangeTracker;
