//! Configuration schema definitions.
//!
//! This module defines the static deployment configuration of the control
//! plane. All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the control plane.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Discovery server settings (where proxies connect).
    pub discovery: DiscoveryConfig,

    /// Ingress listener handed to the proxies.
    pub listener: ListenerConfig,

    /// Backend the generated clusters point at.
    pub backend: BackendConfig,

    /// Which service specification to serve and how to find it.
    pub service: ServiceConfig,

    /// Usage-reporting endpoint embedded into the service_control filter.
    pub service_control: ServiceControlConfig,

    /// Instance metadata server (access tokens).
    pub metadata: MetadataConfig,

    /// Timeouts for external calls made during a generation cycle.
    pub timeouts: TimeoutConfig,

    /// Backoff applied after a failed generation cycle.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Discovery server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Bind address (e.g., "0.0.0.0:8790").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8790".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the discovery server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Address and port of the ingress listener the proxies open.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub address: String,
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Backend server configuration, shared by every generated cluster.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend host (e.g., "127.0.0.1").
    pub address: String,

    /// Backend port.
    pub port: u16,

    /// Connect timeout written into each cluster, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8082,
            connect_timeout_secs: 20,
        }
    }
}

/// How the config id to serve is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutStrategy {
    /// Always serve `service.config_id`.
    Fixed,
    /// Follow the latest successful rollout of the management service.
    Managed,
}

/// Service specification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name (e.g., "bookstore.endpoints.project123.cloud.goog").
    pub name: String,

    /// Config id to serve with the fixed rollout strategy.
    pub config_id: Option<String>,

    pub rollout_strategy: RolloutStrategy,

    /// Base URL of the service management API.
    pub management_url: String,

    /// Read the specification from a local JSON file instead of the
    /// management API. The file is watched for changes.
    pub spec_path: Option<String>,

    /// Interval between generation cycles in seconds.
    pub check_interval_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            config_id: None,
            rollout_strategy: RolloutStrategy::Fixed,
            management_url: "https://servicemanagement.googleapis.com".to_string(),
            spec_path: None,
            check_interval_secs: 60,
        }
    }
}

/// Usage-reporting endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceControlConfig {
    pub uri: String,
    pub cluster: String,
    pub timeout_secs: u64,
}

impl Default for ServiceControlConfig {
    fn default() -> Self {
        Self {
            uri: "https://servicecontrol.googleapis.com/v1/services/".to_string(),
            cluster: "service_control_cluster".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Metadata server used for access tokens.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Token endpoint of the default service account.
    pub token_url: String,

    /// Cluster name the proxy uses to reach the metadata server.
    pub cluster: String,

    pub timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            token_url: "http://169.254.169.254/computeMetadata/v1/instance/service-accounts/default/token"
                .to_string(),
            cluster: "gcp_metadata_cluster".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Timeout configuration for generation-time calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for each specification, key or token fetch, in seconds.
    pub fetch_secs: u64,
}

impl TimeoutConfig {
    pub fn fetch(&self) -> Duration {
        Duration::from_secs(self.fetch_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { fetch_secs: 5 }
    }
}

/// Retry configuration for failed generation cycles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8791".to_string(),
        }
    }
}
