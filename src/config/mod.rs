//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ControlPlaneConfig (validated, immutable)
//!     → handed to startup, which builds sources, generator and servers
//!
//! Local specification file (optional):
//!     watcher.rs detects change
//!     → Trigger::SpecChanged sent to the config manager
//!     → new generation cycle
//! ```
//!
//! # Design Decisions
//! - Deployment config is immutable once loaded; only the service
//!   specification is re-read at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    AdminConfig, BackendConfig, ControlPlaneConfig, DiscoveryConfig, ListenerConfig, LogFormat,
    MetadataConfig, ObservabilityConfig, RetryConfig, RolloutStrategy, ServiceConfig,
    ServiceControlConfig, TimeoutConfig, TlsConfig,
};
