//! API gateway control plane.
//!
//! # Architecture Overview
//!
//! ```text
//!   management API / spec file        JWKS endpoints      metadata server
//!              │                            │                    │
//!              ▼                            ▼                    ▼
//!   ┌───────────────────────────────────────────────────────────────────┐
//!   │                       manager (one cycle at a time)                │
//!   │   fetch spec → resolve keys/token → generator → snapshot publish   │
//!   └───────────────────────────────┬───────────────────────────────────┘
//!                                   │ atomic swap
//!                                   ▼
//!                        ┌─────────────────────┐
//!                        │  current Snapshot   │
//!                        └──────────┬──────────┘
//!                                   │ lock-free reads
//!                                   ▼
//!   ┌───────────────────────────────────────────────────────────────────┐
//!   │        discovery (REST pull, WebSocket stream)     admin API       │
//!   └───────────────────────────────┬───────────────────────────────────┘
//!                                   │
//!                                   ▼
//!                              proxy nodes
//! ```

use clap::Parser;
use std::path::PathBuf;

use gateway_control_plane::config::{read_config, ConfigError, ControlPlaneConfig};
use gateway_control_plane::config::validation::validate_config;
use gateway_control_plane::lifecycle::startup;
use gateway_control_plane::observability::logging;

#[derive(Parser)]
#[command(name = "gateway-control-plane")]
#[command(about = "Serves proxy configuration generated from a service specification", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service name, overriding `[service].name`.
    #[arg(long)]
    service_name: Option<String>,

    /// Config id to serve, overriding `[service].config_id`.
    #[arg(long)]
    config_id: Option<String>,

    /// Read the specification from a local JSON file instead of the management API.
    #[arg(long)]
    spec_file: Option<String>,

    /// Discovery server bind address, overriding `[discovery].bind_address`.
    #[arg(long)]
    discovery_address: Option<String>,
}

impl Args {
    fn apply(self, config: &mut ControlPlaneConfig) {
        if let Some(name) = self.service_name {
            config.service.name = name;
        }
        if let Some(id) = self.config_id {
            config.service.config_id = Some(id);
        }
        if let Some(path) = self.spec_file {
            config.service.spec_path = Some(path);
        }
        if let Some(address) = self.discovery_address {
            config.discovery.bind_address = address;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = Args::parse();

    let mut config = match args.config.take() {
        Some(path) => read_config(&path)?,
        None => ControlPlaneConfig::default(),
    };
    args.apply(&mut config);

    logging::init(&config.observability);

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(error = %error, "Invalid configuration");
        }
        return Err(ConfigError::Validation(errors).into());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        service = %config.service.name,
        discovery_address = %config.discovery.bind_address,
        "gateway-control-plane starting"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
