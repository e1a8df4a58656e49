//! Authoritative DNS front for registered hostnames.
//!
//! # Dynamic A/AAAA Records
//!
//! Each accepted registration binds `<hostname>.<domain>` to the host's
//! current IP in the shared [`ZoneStore`][zone::ZoneStore]; queries are
//! answered from that live state, so a hostname always resolves to the last
//! address its owner registered. When the heartbeat monitor takes a host
//! offline (or the cleanup sweep deletes it) the record is removed and the
//! name returns NXDOMAIN.
//!
//! E.g. with config:
//! ```json
//! {
//!   "domain": "dyn.example.com",
//!   ...
//! }
//! ```
//!
//! after `host1` registers from `203.0.113.5`, an `A` query would return:
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 +short host1.dyn.example.com A
//! 203.0.113.5
//! ```
//!
//! Answers carry the configured `dns_ttl` (default 60s, deliberately low so
//! IP changes propagate quickly).
//!
//! # Static Records
//!
//! ## NS
//!
//! `NS` class queries for the zone apex return the configured
//! [`ns_domain`][`crate::config::Config::ns_domain`].
//!
//! ## SOA
//!
//! `SOA` class queries for the zone apex are answered from
//! [`ns_domain`][`crate::config::Config::ns_domain`] and
//! [`ns_admin`][`crate::config::Config::ns_admin`], with a date-based zone
//! serial.

mod handlers;
pub mod server;
pub mod zone;

pub use handlers::Handler;
pub use server::new;
pub use zone::{DnsSync, DynDnsSync, ZoneStore};
