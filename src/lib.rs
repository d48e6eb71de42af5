//! API gateway control plane.
//!
//! Translates a service specification into proxy listener and cluster
//! resources and serves them to proxy nodes over a versioned discovery
//! protocol.

pub mod config;
pub mod servicespec;
pub mod sources;
pub mod resources;
pub mod generator;
pub mod snapshot;
pub mod discovery;
pub mod manager;
pub mod net;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod admin;

pub use config::schema::ControlPlaneConfig;
pub use discovery::{DiscoveryResponder, DiscoveryServer};
pub use generator::ConfigGenerator;
pub use lifecycle::shutdown::Shutdown;
pub use manager::ConfigManager;
pub use snapshot::SnapshotPublisher;
