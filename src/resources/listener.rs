//! Listener resource.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Serialize as DeriveSerialize;

use crate::resources::filters::HttpFilter;
use crate::resources::Address;

pub const HTTP_CONNECTION_MANAGER: &str = "envoy.http_connection_manager";

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    pub name: String,
    pub address: Address,
    pub filter_chains: Vec<FilterChain>,
}

impl Listener {
    /// The HTTP connection manager of the first filter chain.
    pub fn http_connection_manager(&self) -> Option<&HttpConnectionManager> {
        self.filter_chains
            .iter()
            .flat_map(|chain| chain.filters.iter())
            .map(|filter| match filter {
                NetworkFilter::HttpConnectionManager(hcm) => hcm,
            })
            .next()
    }

    /// Every cluster a route of this listener points at.
    pub fn referenced_clusters(&self) -> impl Iterator<Item = &str> {
        self.filter_chains
            .iter()
            .flat_map(|chain| chain.filters.iter())
            .flat_map(|filter| match filter {
                NetworkFilter::HttpConnectionManager(hcm) => hcm.route_config.virtual_hosts.iter(),
            })
            .flat_map(|vh| vh.routes.iter())
            .map(|route| route.route.cluster.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct FilterChain {
    pub filters: Vec<NetworkFilter>,
}

/// Network-level filters. HTTP is the only protocol served.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkFilter {
    HttpConnectionManager(HttpConnectionManager),
}

impl Serialize for NetworkFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("NetworkFilter", 2)?;
        match self {
            NetworkFilter::HttpConnectionManager(config) => {
                s.serialize_field("name", HTTP_CONNECTION_MANAGER)?;
                s.serialize_field("config", config)?;
            }
        }
        s.end()
    }
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct HttpConnectionManager {
    pub stat_prefix: String,
    pub route_config: RouteConfiguration,
    pub http_filters: Vec<HttpFilter>,
}

impl HttpConnectionManager {
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.http_filters.iter().map(HttpFilter::name).collect()
    }
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct RouteConfiguration {
    pub name: String,
    pub virtual_hosts: Vec<VirtualHost>,
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct VirtualHost {
    pub name: String,
    pub domains: Vec<String>,
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct Route {
    #[serde(rename = "match")]
    pub route_match: RouteMatch,
    pub route: RouteAction,
}

#[derive(Debug, Clone, PartialEq, Eq, DeriveSerialize)]
pub struct RouteMatch {
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, DeriveSerialize)]
pub struct RouteAction {
    pub cluster: String,
}
