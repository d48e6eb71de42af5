//! HTTP filter configurations.
//!
//! One struct per filter kind. [`HttpFilter`] is the closed set of filters a
//! generated chain may contain; its `Serialize` impl is the single place where
//! a variant is mapped to its wire `name`.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Serialize as DeriveSerialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::resources::{serialize_seconds, RouteMatch};

pub const GRPC_JSON_TRANSCODER: &str = "envoy.grpc_json_transcoder";
pub const JWT_AUTHN: &str = "envoy.filters.http.jwt_authn";
pub const SERVICE_CONTROL: &str = "envoy.filters.http.service_control";
pub const ROUTER: &str = "envoy.router";

/// A filter in the HTTP connection manager's chain.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpFilter {
    GrpcJsonTranscoder(TranscoderConfig),
    JwtAuthn(JwtAuthnConfig),
    ServiceControl(ServiceControlFilterConfig),
    Router,
}

impl HttpFilter {
    /// Wire name of the filter.
    pub fn name(&self) -> &'static str {
        match self {
            HttpFilter::GrpcJsonTranscoder(_) => GRPC_JSON_TRANSCODER,
            HttpFilter::JwtAuthn(_) => JWT_AUTHN,
            HttpFilter::ServiceControl(_) => SERVICE_CONTROL,
            HttpFilter::Router => ROUTER,
        }
    }
}

#[derive(DeriveSerialize)]
struct EmptyConfig {}

impl Serialize for HttpFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("HttpFilter", 2)?;
        s.serialize_field("name", self.name())?;
        match self {
            HttpFilter::GrpcJsonTranscoder(config) => s.serialize_field("config", config)?,
            HttpFilter::JwtAuthn(config) => s.serialize_field("config", config)?,
            HttpFilter::ServiceControl(config) => s.serialize_field("config", config)?,
            HttpFilter::Router => s.serialize_field("config", &EmptyConfig {})?,
        }
        s.end()
    }
}

/// JSON to gRPC transcoding.
#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct TranscoderConfig {
    /// Base64 of the compiled descriptor set.
    pub proto_descriptor_bin: String,
    pub services: Vec<String>,
}

/// JWT validation.
#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct JwtAuthnConfig {
    /// Keyed by provider id; ordered for deterministic output.
    pub providers: BTreeMap<String, JwtProvider>,
    pub rules: Vec<JwtRule>,
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct JwtProvider {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,
    pub issuer: String,
    pub local_jwks: DataSource,
}

/// Inline key material.
#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct DataSource {
    pub inline_string: String,
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct JwtRule {
    #[serde(rename = "match")]
    pub route_match: RouteMatch,
    pub requires: JwtRequirement,
}

/// What a request must present to pass a [`JwtRule`].
#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
#[serde(rename_all = "snake_case")]
pub enum JwtRequirement {
    /// Any token from the provider, with the provider's own audiences.
    ProviderName(String),
    /// A token from the provider carrying one of the listed audiences.
    ProviderAndAudiences(ProviderWithAudiences),
    /// Any one of the member requirements.
    RequiresAny(RequirementOrList),
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct ProviderWithAudiences {
    pub provider_name: String,
    pub audiences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct RequirementOrList {
    pub requirements: Vec<JwtRequirement>,
}

/// Usage reporting.
#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct ServiceControlFilterConfig {
    pub rules: Vec<ServiceControlRule>,
    pub service_control_uri: HttpUri,
    pub service_name: String,
    pub services: Vec<ServiceControlService>,
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct ServiceControlRule {
    pub patterns: Vec<RoutePattern>,
    pub requires: OperationRequirement,
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct OperationRequirement {
    pub operation_name: String,
    pub service_name: String,
}

#[derive(Debug, Clone, PartialEq, DeriveSerialize)]
pub struct ServiceControlService {
    pub service_control_uri: HttpUri,
    pub service_name: String,
    pub token_uri: HttpUri,
}

/// An (HTTP verb, URI template) pair a method is reachable under.
#[derive(Debug, Clone, PartialEq, Eq, DeriveSerialize)]
pub struct RoutePattern {
    pub http_method: String,
    pub uri_template: String,
}

impl RoutePattern {
    pub fn new(http_method: impl Into<String>, uri_template: impl Into<String>) -> Self {
        Self {
            http_method: http_method.into(),
            uri_template: uri_template.into(),
        }
    }
}

/// An outbound call target the proxy makes on its own behalf.
#[derive(Debug, Clone, PartialEq, Eq, DeriveSerialize)]
pub struct HttpUri {
    pub cluster: String,
    #[serde(serialize_with = "serialize_seconds")]
    pub timeout: Duration,
    pub uri: String,
}
