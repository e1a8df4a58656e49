use anyhow::{anyhow, Result};
use dyncrab::error::Error::DNSError;
use dyncrab::{
    Config, HeartbeatMonitor, HostRegistrar, IpChangeTracker, RegistrationServer, SharedConfig,
    ZoneStore,
};
use is_terminal::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut first_args = std::env::args().take(2);
    let (program_name, config_file) = (
        first_args.next().unwrap_or("dyncrab".to_string()),
        first_args.next(),
    );

    let config = config_init(&program_name, config_file)?;
    let host_store = config.host_store().await?;

    if std::io::stdout().is_terminal() {
        println!("{}", dyncrab::crab::CRAB);
    }

    let zone = ZoneStore::new(&config.domain);
    let tracker = IpChangeTracker::new(config.max_history_entries, config.exclude_private_ips);
    let registrar = Arc::new(HostRegistrar::new(
        host_store,
        Arc::new(zone.clone()),
        tracker,
        config.max_requests_per_minute,
    ));
    let shutdown = Arc::new(Notify::new());

    tracing::info!("DNS listening on UDP {}", &config.dns_udp_bind_addr);
    tracing::info!("DNS listening on TCP {}", &config.dns_tcp_bind_addr);
    let dns_server = dyncrab::dns::new(config.clone(), zone).await?;
    let dns_handle = tokio::spawn(dns_server.block_until_done());

    let monitor = HeartbeatMonitor::new(registrar.clone(), config.clone());
    let sweep_monitor = monitor.clone();
    let sweep_shutdown = shutdown.clone();
    let sweep_handle = tokio::spawn(async move { sweep_monitor.run(sweep_shutdown).await });
    let cleanup_monitor = monitor.clone();
    let cleanup_shutdown = shutdown.clone();
    let cleanup_handle =
        tokio::spawn(async move { cleanup_monitor.run_cleanup(cleanup_shutdown).await });

    tracing::info!("API listening on {}", &config.api_bind_addr);
    let api_server = dyncrab::api::new(config.clone(), registrar.clone(), monitor);
    let api_handle = tokio::spawn(api_server);

    let registration_server =
        RegistrationServer::bind(config.clone(), registrar, shutdown.clone()).await?;
    let server_handle = tokio::spawn(registration_server.run());

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        Ok(dns_res) = dns_handle => {
            if let Err(err) = dns_res {
                return Err(DNSError(err).into())
            }
        }
        Ok(api_res) = api_handle => {
            if let Err(err) = api_res {
                return Err(err.into())
            }
        }
    }

    // Stop accepting, let in-flight handlers and the sweep loops wind down,
    // then leave regardless.
    shutdown.notify_waiters();
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = server_handle.await;
        let _ = sweep_handle.await;
        let _ = cleanup_handle.await;
    })
    .await;

    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dyncrab=info".into()),
        )
        .init();
}

fn config_init(program_name: &str, config_file: Option<String>) -> Result<SharedConfig> {
    match config_file {
        None => Err(anyhow!("usage: {program_name} /path/to/config.json")),
        Some(config_file) => {
            tracing::debug!("loaded config from {config_file}");
            let config = Config::try_from_file(&config_file)?;
            Ok(Arc::new(config))
        }
    }
}
