//! Discovery wire messages.
//!
//! Requests are accepted in both snake_case and the camelCase the proxy uses
//! for its JSON REST transport; responses are written in snake_case.

use serde::{Deserialize, Serialize};

use crate::resources::Resource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiscoveryRequest {
    #[serde(alias = "versionInfo")]
    pub version_info: String,
    pub node: Option<Node>,
    #[serde(alias = "resourceNames")]
    pub resource_names: Vec<String>,
    #[serde(alias = "typeUrl")]
    pub type_url: String,
    #[serde(alias = "responseNonce")]
    pub response_nonce: String,
    /// Set when the node rejects the previously sent configuration.
    #[serde(alias = "errorDetail")]
    pub error_detail: Option<Status>,
}

impl DiscoveryRequest {
    pub fn node_id(&self) -> Option<&str> {
        self.node.as_ref().map(|n| n.id.as_str()).filter(|id| !id.is_empty())
    }

    /// A request answering an earlier response (ACK or NACK), as opposed to
    /// the first request of a subscription.
    pub fn is_reply(&self) -> bool {
        !self.response_nonce.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Node {
    pub id: String,
    pub cluster: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Status {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryResponse {
    pub version_info: String,
    pub resources: Vec<Resource>,
    pub type_url: String,
    pub nonce: String,
}
