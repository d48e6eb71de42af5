//! Startup orchestration.
//!
//! Order: metrics, sources, generator and publisher, config manager,
//! file watcher, admin API, and the discovery server last, so proxies only
//! connect once everything behind them runs.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::ControlPlaneConfig;
use crate::config::watcher::SpecWatcher;
use crate::discovery::{DiscoveryResponder, DiscoveryServer};
use crate::generator::{ConfigGenerator, GeneratorOptions};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::handle_signals;
use crate::manager::ConfigManager;
use crate::net::tls::load_tls_config;
use crate::observability::metrics;
use crate::snapshot::SnapshotPublisher;
use crate::sources::{
    FileSpecificationSource, HttpKeySource, HttpSpecificationSource, MetadataTokenSource,
    SpecificationSource, TokenSource,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to watch specification file: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to load TLS configuration: {0}")]
    Tls(#[source] std::io::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Run the control plane until a shutdown signal arrives.
pub async fn run(config: ControlPlaneConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("gateway-control-plane/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let tokens: Arc<dyn TokenSource> = Arc::new(MetadataTokenSource::new(client.clone(), &config.metadata));
    let source: Arc<dyn SpecificationSource> = match &config.service.spec_path {
        Some(path) => {
            tracing::info!(path = %path, "Reading service specification from file");
            Arc::new(FileSpecificationSource::new(path, config.service.config_id.clone()))
        }
        None => {
            tracing::info!(
                service = %config.service.name,
                strategy = ?config.service.rollout_strategy,
                "Fetching service specification from management API"
            );
            Arc::new(HttpSpecificationSource::new(client.clone(), &config.service, tokens.clone()))
        }
    };
    let keys = Arc::new(HttpKeySource::new(client));

    let publisher = Arc::new(SnapshotPublisher::new());
    let generator = ConfigGenerator::new(GeneratorOptions::from(&config));
    let manager = Arc::new(
        ConfigManager::new(source, keys, tokens, generator, publisher.clone())
            .with_fetch_timeout(config.timeouts.fetch()),
    );
    let responder = Arc::new(DiscoveryResponder::new(publisher));
    let shutdown = Arc::new(Shutdown::new());
    let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();

    let manager_task = tokio::spawn(manager.clone().run(
        Duration::from_secs(config.service.check_interval_secs),
        config.retries.clone(),
        trigger_rx,
        shutdown.subscribe(),
    ));

    // Dropping the watcher stops the notifications.
    let _watcher = match &config.service.spec_path {
        Some(path) => Some(SpecWatcher::new(Path::new(path), trigger_tx.clone()).run()?),
        None => None,
    };

    if config.admin.enabled {
        let listener = bind(&config.admin.bind_address).await?;
        let router = setup_admin_router(AdminState {
            manager: manager.clone(),
            responder: responder.clone(),
            triggers: trigger_tx.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        });
        let mut stop = shutdown.subscribe();
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    tokio::spawn(handle_signals(shutdown.clone(), trigger_tx));

    let server = DiscoveryServer::new(responder, shutdown.clone());
    let served = match &config.discovery.tls {
        Some(tls) => {
            let addr = config
                .discovery
                .bind_address
                .parse::<SocketAddr>()
                .map_err(|e| StartupError::Bind {
                    address: config.discovery.bind_address.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
                })?;
            let tls = load_tls_config(tls).await.map_err(StartupError::Tls)?;
            server.run_tls(addr, tls).await
        }
        None => server.run(bind(&config.discovery.bind_address).await?).await,
    };

    shutdown.trigger();
    if manager_task.await.is_err() {
        tracing::warn!("Config manager task ended abnormally");
    }

    served.map_err(StartupError::Serve)
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address).await.map_err(|source| StartupError::Bind {
        address: address.to_string(),
        source,
    })
}
