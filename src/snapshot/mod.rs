//! Versioned snapshot publishing.
//!
//! # Data Flow
//! ```text
//! ConfigManager (single writer)
//!     → publisher.rs  (validate, build off to the side, one atomic swap)
//!     → watch channel (new version announced)
//!     → discovery     (readers load the current Arc<Snapshot>, never block)
//! ```
//!
//! # Design Decisions
//! - A superseded snapshot is never mutated; readers holding it stay valid
//! - A version maps to exactly one content for the lifetime of the process

pub mod publisher;
#[allow(clippy::module_inception)]
pub mod snapshot;

use thiserror::Error;

pub use publisher::SnapshotPublisher;
pub use snapshot::Snapshot;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("route references cluster {cluster} which is not part of the snapshot")]
    DanglingCluster { cluster: String },

    #[error("version {version} was already published with different content")]
    VersionReuse { version: String },

    #[error("snapshot version must not be empty")]
    EmptyVersion,

    #[error("failed to encode snapshot content: {0}")]
    Encode(#[source] serde_json::Error),
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::time::Duration;

    use crate::resources::{
        Address, Cluster, FilterChain, HttpConnectionManager, HttpFilter, Listener, NetworkFilter,
        Route, RouteAction, RouteConfiguration, RouteMatch, VirtualHost,
    };

    /// A listener routing one prefix to each named cluster.
    pub fn listener_to(clusters: &[&str]) -> Listener {
        Listener {
            name: "ingress_listener".into(),
            address: Address::socket("0.0.0.0", 8080),
            filter_chains: vec![FilterChain {
                filters: vec![NetworkFilter::HttpConnectionManager(HttpConnectionManager {
                    stat_prefix: "ingress_http".into(),
                    route_config: RouteConfiguration {
                        name: "local_route".into(),
                        virtual_hosts: vec![VirtualHost {
                            name: "backend".into(),
                            domains: vec!["*".into()],
                            routes: clusters
                                .iter()
                                .map(|c| Route {
                                    route_match: RouteMatch { prefix: format!("/{}", c) },
                                    route: RouteAction { cluster: c.to_string() },
                                })
                                .collect(),
                        }],
                    },
                    http_filters: vec![HttpFilter::Router],
                })],
            }],
        }
    }

    pub fn cluster(name: &str) -> Cluster {
        Cluster {
            name: name.into(),
            connect_timeout: Duration::from_secs(20),
            hosts: vec![Address::socket("127.0.0.1", 8082)],
            http2_protocol_options: None,
        }
    }
}
