//! Read-only HTTP API for observing the host table.
//!
//! # API Endpoints
//!
//! ## `/healthcheck` (GET)
//!
//!   Returns HTTP 200 (OK) and the JSON body `{"ok":"healthy"}` when the
//!   service is operational.
//!
//! ## `/hosts` (GET)
//!
//!   Returns the registered hosts. Accepts optional query parameters
//!   `status` (`online`/`offline`) and `limit`:
//!
//!   ```bash
//!   ❯ curl 'http://localhost:3000/hosts?status=online&limit=10'
//!   ```
//!
//! ## `/hosts/:hostname` (GET)
//!
//!   Returns one host record together with its retained IP change history,
//!   or HTTP 404 (Not Found) for unknown hostnames.
//!
//! ## `/stats` (GET)
//!
//!   Returns host counts by status, IP change statistics and heartbeat sweep
//!   statistics in one JSON document.
//!
//! There are deliberately no mutation endpoints: hosts enter and leave the
//! table through the registration protocol and the background sweeps only.

mod api_error;
mod model;
mod routes;
pub mod server;

pub use server::new;
