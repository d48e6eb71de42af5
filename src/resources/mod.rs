//! Proxy configuration resources.
//!
//! # Data Flow
//! ```text
//! generator (typed construction)
//!     → listener.rs / cluster.rs / filters.rs (closed schema types)
//!     → snapshot (immutable bundle)
//!     → discovery (serialized as JSON, tagged with "@type")
//! ```
//!
//! # Design Decisions
//! - Every wire field is a named Rust field; no dynamic maps
//! - Field names follow the proxy's JSON conventions exactly: camelCase on
//!   resource envelopes, snake_case inside filter configs
//! - Ordered collections only, so identical input serializes identically

pub mod cluster;
pub mod filters;
pub mod listener;

use serde::{Serialize, Serializer};
use std::time::Duration;

pub use cluster::{Cluster, Http2ProtocolOptions};
pub use filters::{
    DataSource, HttpFilter, HttpUri, JwtAuthnConfig, JwtProvider, JwtRequirement, JwtRule,
    OperationRequirement, ProviderWithAudiences, RequirementOrList, RoutePattern,
    ServiceControlFilterConfig, ServiceControlRule, ServiceControlService, TranscoderConfig,
};
pub use listener::{
    FilterChain, HttpConnectionManager, Listener, NetworkFilter, Route, RouteAction,
    RouteConfiguration, RouteMatch, VirtualHost,
};

pub const LISTENER_TYPE_URL: &str = "type.googleapis.com/envoy.api.v2.Listener";
pub const CLUSTER_TYPE_URL: &str = "type.googleapis.com/envoy.api.v2.Cluster";

/// The resource kinds served over discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Listener,
    Cluster,
}

impl ResourceType {
    /// Push order for streaming sessions: clusters before the listener that
    /// references them.
    pub const ALL: [ResourceType; 2] = [ResourceType::Cluster, ResourceType::Listener];

    pub fn type_url(self) -> &'static str {
        match self {
            ResourceType::Listener => LISTENER_TYPE_URL,
            ResourceType::Cluster => CLUSTER_TYPE_URL,
        }
    }

    pub fn from_type_url(type_url: &str) -> Option<Self> {
        match type_url {
            LISTENER_TYPE_URL => Some(ResourceType::Listener),
            CLUSTER_TYPE_URL => Some(ResourceType::Cluster),
            _ => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(self) -> &'static str {
        match self {
            ResourceType::Listener => "listener",
            ResourceType::Cluster => "cluster",
        }
    }
}

/// A resource as it appears in a discovery response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "@type")]
pub enum Resource {
    #[serde(rename = "type.googleapis.com/envoy.api.v2.Listener")]
    Listener(Listener),
    #[serde(rename = "type.googleapis.com/envoy.api.v2.Cluster")]
    Cluster(Cluster),
}

impl Resource {
    pub fn name(&self) -> &str {
        match self {
            Resource::Listener(l) => &l.name,
            Resource::Cluster(c) => &c.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    #[serde(rename = "socketAddress")]
    pub socket_address: SocketAddress,
}

impl Address {
    pub fn socket(address: impl Into<String>, port: u16) -> Self {
        Self {
            socket_address: SocketAddress {
                address: address.into(),
                port_value: port,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocketAddress {
    pub address: String,
    #[serde(rename = "portValue")]
    pub port_value: u16,
}

/// Durations are written as seconds with an "s" suffix ("5s", "0.250s").
pub(crate) fn serialize_seconds<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    let millis = d.subsec_millis();
    if millis == 0 {
        s.serialize_str(&format!("{}s", d.as_secs()))
    } else {
        s.serialize_str(&format!("{}.{:03}s", d.as_secs(), millis))
    }
}
