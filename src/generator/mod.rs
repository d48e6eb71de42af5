//! Translation of a service specification into proxy resources.
//!
//! # Data Flow
//! ```text
//! ServiceSpecification + ResolvedCredentials
//!     → routes.rs       (patterns per method, prefix route per API)
//!     → transcoding.rs  (grpc_json_transcoder, if a descriptor is attached)
//!     → authn.rs        (jwt_authn, if providers are declared)
//!     → usage.rs        (service_control, if reporting is enabled)
//!     → router (always last)
//!     → one Listener + one Cluster per API
//! ```
//!
//! # Design Decisions
//! - Generation is pure: every network input is resolved beforehand by the
//!   manager and passed in through [`ResolvedCredentials`]
//! - Only ordered collections are used, so equal input yields byte-identical
//!   output

pub mod authn;
pub mod error;
pub mod routes;
pub mod transcoding;
pub mod usage;

use std::time::Duration;

use crate::config::ControlPlaneConfig;
use crate::resources::{
    Address, Cluster, FilterChain, Http2ProtocolOptions, HttpConnectionManager, HttpFilter, HttpUri,
    Listener, NetworkFilter, RouteConfiguration, VirtualHost,
};
use crate::servicespec::{ServiceSpecification, Syntax};

pub use authn::{build_jwt_filter, ResolvedKeys};
pub use error::GenerationError;
pub use routes::{build_route_table, MethodPatterns, RouteTable, Warning};

/// Key and token material fetched for one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedCredentials {
    /// JWKS per auth provider id.
    pub keys: ResolvedKeys,
    /// Token endpoint for outbound usage reports; set when reporting is on.
    pub token_uri: Option<HttpUri>,
}

/// Deployment-level inputs that do not come from the specification.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOptions {
    pub listener_name: String,
    pub listener_address: String,
    pub listener_port: u16,
    pub backend_address: String,
    pub backend_port: u16,
    pub connect_timeout: Duration,
    pub service_control_uri: HttpUri,
}

impl From<&ControlPlaneConfig> for GeneratorOptions {
    fn from(config: &ControlPlaneConfig) -> Self {
        Self {
            listener_name: "ingress_listener".to_string(),
            listener_address: config.listener.address.clone(),
            listener_port: config.listener.port,
            backend_address: config.backend.address.clone(),
            backend_port: config.backend.port,
            connect_timeout: Duration::from_secs(config.backend.connect_timeout_secs),
            service_control_uri: HttpUri {
                cluster: config.service_control.cluster.clone(),
                timeout: Duration::from_secs(config.service_control.timeout_secs),
                uri: config.service_control.uri.clone(),
            },
        }
    }
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self::from(&ControlPlaneConfig::default())
    }
}

/// Output of one successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub listener: Listener,
    pub clusters: Vec<Cluster>,
    pub warnings: Vec<Warning>,
}

/// Composes the policy builders into a listener and its clusters.
#[derive(Debug, Clone, Default)]
pub struct ConfigGenerator {
    options: GeneratorOptions,
}

impl ConfigGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn generate(
        &self,
        spec: &ServiceSpecification,
        credentials: &ResolvedCredentials,
    ) -> Result<Generated, GenerationError> {
        for api in &spec.apis {
            if api.name.is_empty() {
                return Err(GenerationError::MissingField { field: "apis[].name" });
            }
        }

        let table = build_route_table(spec);
        for warning in &table.warnings {
            tracing::warn!(service = %spec.name, "{}", warning);
        }

        let mut http_filters = Vec::with_capacity(4);
        if let Some(config) = transcoding::build_transcoder(spec)? {
            http_filters.push(HttpFilter::GrpcJsonTranscoder(config));
        }
        if let Some(config) = build_jwt_filter(&spec.authentication, &credentials.keys)? {
            http_filters.push(HttpFilter::JwtAuthn(config));
        }
        if let Some(config) = usage::build_service_control(
            spec,
            &table.methods,
            &self.options.service_control_uri,
            credentials.token_uri.as_ref(),
        )? {
            http_filters.push(HttpFilter::ServiceControl(config));
        }
        http_filters.push(HttpFilter::Router);

        let listener = Listener {
            name: self.options.listener_name.clone(),
            address: Address::socket(&self.options.listener_address, self.options.listener_port),
            filter_chains: vec![FilterChain {
                filters: vec![NetworkFilter::HttpConnectionManager(HttpConnectionManager {
                    stat_prefix: "ingress_http".to_string(),
                    route_config: RouteConfiguration {
                        name: "local_route".to_string(),
                        virtual_hosts: vec![VirtualHost {
                            name: "backend".to_string(),
                            domains: vec!["*".to_string()],
                            routes: table.routes,
                        }],
                    },
                    http_filters,
                })],
            }],
        };

        let clusters = spec
            .apis
            .iter()
            .map(|api| Cluster {
                name: routes::cluster_name(api),
                connect_timeout: self.options.connect_timeout,
                hosts: vec![Address::socket(&self.options.backend_address, self.options.backend_port)],
                http2_protocol_options: (api.syntax == Syntax::Proto3).then(Http2ProtocolOptions::default),
            })
            .collect();

        Ok(Generated {
            listener,
            clusters,
            warnings: table.warnings,
        })
    }
}
