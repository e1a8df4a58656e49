use crate::api::routes;
use crate::config::SharedConfig;
use crate::monitor::HeartbeatMonitor;
use crate::registrar::HostRegistrar;
use std::future::Future;
use std::sync::Arc;

#[derive(Clone)]
pub(super) struct AppState {
    pub config: SharedConfig,
    pub registrar: Arc<HostRegistrar>,
    pub monitor: HeartbeatMonitor,
}

pub fn new(
    config: SharedConfig,
    registrar: Arc<HostRegistrar>,
    monitor: HeartbeatMonitor,
) -> impl Future<Output = hyper::Result<()>> {
    axum::Server::bind(&config.api_bind_addr).serve(
        routes::new(AppState {
            config: config.clone(),
            registrar,
            monitor,
        })
        .into_make_service(),
    )
}
