//! Registration protocol server.
//!
//! Accepts TCP connections and speaks the [framed protocol][crate::proto],
//! one task per connection. A connection carries any number of messages: a
//! long-lived client heartbeats over one connection for its whole life, a
//! short-lived one reconnects per message, both are fine.
//!
//! Error handling follows the frame/schema split: a frame that can't be read
//! (bad length, cut stream) gets a best-effort error response and the
//! connection is closed; a readable frame with a bad payload (malformed JSON,
//! missing fields, failed validation, over-budget hostname) gets an error
//! response and the connection stays open. Either way the client receives a
//! well-formed response for anything that reaches us; only a hard disconnect
//! goes unreported.

pub mod connection;

pub use connection::Connection;

use crate::config::SharedConfig;
use crate::error::Error;
use crate::proto::{self, Message, Response};
use crate::registrar::HostRegistrar;
use crate::response::ResponseBuilder;
use crate::tracker::IpChangeTracker;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// TCP front of the registration protocol.
#[allow(clippy::module_name_repetitions)]
pub struct RegistrationServer {
    listener: TcpListener,
    config: SharedConfig,
    registrar: Arc<HostRegistrar>,
    responses: ResponseBuilder,
    shutdown: Arc<Notify>,
}

impl RegistrationServer {
    /// Bind the configured listener address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the address can't be bound.
    pub async fn bind(
        config: SharedConfig,
        registrar: Arc<HostRegistrar>,
        shutdown: Arc<Notify>,
    ) -> Result<Self, Error> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let responses = ResponseBuilder::new(config.response_detail);
        Ok(Self {
            listener,
            config,
            registrar,
            responses,
            shutdown,
        })
    }

    /// The bound listener address (useful when binding port 0).
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until shutdown fires. In-flight connection tasks
    /// observe the same signal and wind down at their next read.
    pub async fn run(self) {
        info!(addr = %self.config.bind_addr, "registration server listening");
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            debug!(peer = %peer_addr, "new connection");
                            let registrar = self.registrar.clone();
                            let responses = self.responses.clone();
                            let max_message_size = self.config.max_message_size;
                            let shutdown = self.shutdown.clone();
                            tokio::spawn(async move {
                                handle_connection(
                                    stream,
                                    peer_addr,
                                    registrar,
                                    responses,
                                    max_message_size,
                                    shutdown,
                                )
                                .await;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "accept error");
                        }
                    }
                }
                () = self.shutdown.notified() => {
                    info!("registration server shutting down");
                    return;
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registrar: Arc<HostRegistrar>,
    responses: ResponseBuilder,
    max_message_size: usize,
    shutdown: Arc<Notify>,
) {
    let mut conn = Connection::new(stream, peer_addr, max_message_size);

    loop {
        tokio::select! {
            result = conn.read_frame() => {
                match result {
                    Ok(Some(payload)) => {
                        let response =
                            dispatch_frame(&payload, peer_addr.ip(), &registrar, &responses).await;
                        if let Err(err) = conn.send_response(&response).await {
                            warn!(peer = %peer_addr, error = %err, "failed to write response");
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(peer = %peer_addr, "connection closed");
                        break;
                    }
                    Err(err) => {
                        warn!(peer = %peer_addr, error = %err, "read error");
                        if !matches!(err, Error::IO(_)) {
                            // Best effort: the peer may already be gone.
                            let response = responses.error_response(&err, None);
                            let _ = conn.send_response(&response).await;
                        }
                        break;
                    }
                }
            }
            () = shutdown.notified() => {
                debug!(peer = %peer_addr, "connection handler shutting down");
                break;
            }
        }
    }
}

/// Decode and apply one frame, always producing a response to write back.
async fn dispatch_frame(
    payload: &[u8],
    peer_ip: IpAddr,
    registrar: &HostRegistrar,
    responses: &ResponseBuilder,
) -> Response {
    let message = match proto::parse_message(payload) {
        Ok(message) => message,
        Err(err) => {
            debug!(error = %err, "rejected malformed message");
            return responses.error_response(&err, None);
        }
    };

    let ip = match registered_ip(&message, peer_ip, registrar.tracker()) {
        Ok(ip) => ip,
        Err(err) => {
            debug!(hostname = %message.hostname, error = %err, "rejected message IP");
            return responses.error_response(&err, Some(&message.hostname));
        }
    };

    match registrar.process_message(&message.hostname, ip).await {
        Ok(result) => responses.registration_response(&result),
        Err(err) => responses.error_response(&err, Some(&message.hostname)),
    }
}

/// The address a message registers: the self-reported `ip_address` when
/// present (validated), the TCP peer address otherwise.
fn registered_ip(
    message: &Message,
    peer_ip: IpAddr,
    tracker: &IpChangeTracker,
) -> Result<IpAddr, Error> {
    match &message.ip_address {
        Some(s) => tracker.validate_ip(s),
        None => Ok(peer_ip),
    }
}
