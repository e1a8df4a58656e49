use crate::api::api_error::APIError;
use crate::api::model::{HostCounts, HostDetail, HostsQuery, StatsSummary};
use crate::api::server::AppState;
use crate::host_store::{Host, HostStatus};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub(super) fn new(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(health_check))
        .route("/hosts", get(hosts))
        .route("/hosts/:hostname", get(host))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.api_timeout))
        .with_state(state)
}

#[allow(clippy::unused_async)]
async fn health_check() -> impl IntoResponse {
    Json(json!({"ok":"healthy"}))
}

async fn hosts(
    State(state): State<AppState>,
    Query(query): Query<HostsQuery>,
) -> Result<Json<Vec<Host>>, APIError> {
    let hosts = match query.status {
        Some(status) => state.registrar.list_by_status(status, query.limit).await?,
        None => {
            let mut all = state
                .registrar
                .list_by_status(HostStatus::Online, None)
                .await?;
            all.extend(
                state
                    .registrar
                    .list_by_status(HostStatus::Offline, None)
                    .await?,
            );
            if let Some(limit) = query.limit {
                all.truncate(limit);
            }
            all
        }
    };
    Ok(Json(hosts))
}

async fn host(
    State(state): State<AppState>,
    Path(hostname): Path<String>,
) -> Result<Json<HostDetail>, APIError> {
    let host = state.registrar.lookup(&hostname).await?;
    let ip_history = state.registrar.tracker().history(&hostname, None).await;
    Ok(Json(HostDetail { host, ip_history }))
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsSummary>, APIError> {
    let online = state.registrar.count_by_status(HostStatus::Online).await?;
    let offline = state.registrar.count_by_status(HostStatus::Offline).await?;
    Ok(Json(StatsSummary {
        hosts: HostCounts { online, offline },
        ip_changes: state.registrar.tracker().stats().await,
        heartbeat: state.monitor.stats().await,
    }))
}
