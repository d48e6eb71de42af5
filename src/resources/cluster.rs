//! Cluster resource.

use serde::Serialize;
use std::time::Duration;

use crate::resources::{serialize_seconds, Address};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub name: String,
    #[serde(serialize_with = "serialize_seconds")]
    pub connect_timeout: Duration,
    pub hosts: Vec<Address>,
    /// Present when the backend speaks gRPC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http2_protocol_options: Option<Http2ProtocolOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Http2ProtocolOptions {}
