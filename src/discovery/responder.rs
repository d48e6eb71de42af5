//! Answers discovery requests from the current snapshot.
//!
//! # Session State Machine
//! ```text
//! AWAITING_VERSION(v_known)
//!     → snapshot published with v_current != v_known
//!     → RESPOND(resources, v_current)
//!     → AWAITING_VERSION(v_current)
//! ```
//! Whether a node needs a response is decided by comparing versions only.
//! The per-node map exists for operators and is never consulted when
//! answering. It is bounded: a node leaves it when its stream ends, and
//! pull-only nodes are evicted once stale or when the map is full.

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::discovery::types::{DiscoveryRequest, DiscoveryResponse};
use crate::discovery::DiscoveryError;
use crate::observability::metrics;
use crate::resources::ResourceType;
use crate::snapshot::{Snapshot, SnapshotPublisher};

const DEFAULT_MAX_NODES: usize = 1024;
const DEFAULT_NODE_TTL: Duration = Duration::from_secs(600);

/// What the control plane last heard from a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct NodeStatus {
    pub cluster: String,
    /// Last version the node reported per resource type label.
    pub versions: BTreeMap<&'static str, String>,
    pub rejected: u64,
    /// Open streaming sessions of this node.
    pub streams: u32,
    #[serde(skip)]
    last_seen: Option<Instant>,
}

pub struct DiscoveryResponder {
    publisher: Arc<SnapshotPublisher>,
    nodes: DashMap<String, NodeStatus>,
    max_nodes: usize,
    node_ttl: Duration,
}

impl DiscoveryResponder {
    pub fn new(publisher: Arc<SnapshotPublisher>) -> Self {
        Self {
            publisher,
            nodes: DashMap::new(),
            max_nodes: DEFAULT_MAX_NODES,
            node_ttl: DEFAULT_NODE_TTL,
        }
    }

    /// Cap the per-node map and the idle time after which a node without an
    /// open stream is forgotten.
    pub fn with_node_limits(mut self, max_nodes: usize, node_ttl: Duration) -> Self {
        self.max_nodes = max_nodes;
        self.node_ttl = node_ttl;
        self
    }

    pub fn publisher(&self) -> &Arc<SnapshotPublisher> {
        &self.publisher
    }

    /// Answer one request; `None` means the node already has the current version.
    pub fn fetch(&self, request: &DiscoveryRequest) -> Result<Option<DiscoveryResponse>, DiscoveryError> {
        let ty = match self.accept(request) {
            Ok(ty) => ty,
            Err(e) => {
                metrics::record_discovery_request("unknown", "error");
                return Err(e);
            }
        };

        let Some(snapshot) = self.publisher.current() else {
            metrics::record_discovery_request(ty.label(), "unchanged");
            return Ok(None);
        };

        let response = respond(&snapshot, ty, &request.version_info, &request.resource_names);
        metrics::record_discovery_request(ty.label(), if response.is_some() { "response" } else { "unchanged" });
        Ok(response)
    }

    /// Wait until a snapshot newer than the request's version is available.
    pub async fn next_change(&self, request: &DiscoveryRequest) -> Result<DiscoveryResponse, DiscoveryError> {
        let mut changes = self.publisher.subscribe();
        loop {
            changes.borrow_and_update();
            if let Some(response) = self.fetch(request)? {
                return Ok(response);
            }
            changes.changed().await.map_err(|_| DiscoveryError::Closed)?;
        }
    }

    /// Open a streaming session for one connection.
    pub fn session(self: &Arc<Self>) -> StreamSession {
        StreamSession {
            responder: self.clone(),
            changes: self.publisher.subscribe(),
            node: None,
            subscriptions: HashMap::new(),
        }
    }

    pub fn nodes(&self) -> BTreeMap<String, NodeStatus> {
        self.nodes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Validate a request and record what it tells about its node.
    fn accept(&self, request: &DiscoveryRequest) -> Result<ResourceType, DiscoveryError> {
        let node_id = request.node_id().ok_or(DiscoveryError::MissingNode)?;
        let ty = ResourceType::from_type_url(&request.type_url).ok_or_else(|| DiscoveryError::UnknownType {
            type_url: request.type_url.clone(),
        })?;

        let mut status = self.track(node_id);
        if let Some(node) = &request.node {
            if !node.cluster.is_empty() {
                status.cluster = node.cluster.clone();
            }
        }

        if let Some(detail) = &request.error_detail {
            status.rejected += 1;
            tracing::warn!(
                node_id = %node_id,
                type_url = %request.type_url,
                version = %request.version_info,
                code = detail.code,
                error = %detail.message,
                "Node rejected configuration"
            );
        } else if !request.version_info.is_empty() {
            status.versions.insert(ty.label(), request.version_info.clone());
            tracing::debug!(node_id = %node_id, type_url = %request.type_url, version = %request.version_info, "Node reported version");
        }

        Ok(ty)
    }

    fn track(&self, node_id: &str) -> RefMut<'_, String, NodeStatus> {
        if !self.nodes.contains_key(node_id) && self.nodes.len() >= self.max_nodes {
            self.evict();
        }
        let mut status = self.nodes.entry(node_id.to_string()).or_default();
        status.last_seen = Some(Instant::now());
        status
    }

    /// Drop stale pull-only nodes, then the least recently seen ones until
    /// there is room. Nodes with an open stream are kept.
    fn evict(&self) {
        let now = Instant::now();
        let ttl = self.node_ttl;
        self.nodes.retain(|_, status| {
            status.streams > 0 || status.last_seen.is_some_and(|seen| now.duration_since(seen) < ttl)
        });

        while self.nodes.len() >= self.max_nodes {
            let oldest = self
                .nodes
                .iter()
                .filter(|entry| entry.value().streams == 0)
                .min_by_key(|entry| entry.value().last_seen)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(node_id) => {
                    tracing::debug!(node_id = %node_id, "Evicting node status");
                    self.nodes.remove(&node_id);
                }
                None => break,
            }
        }
    }

    fn attach(&self, node_id: &str) {
        if let Some(mut status) = self.nodes.get_mut(node_id) {
            status.streams += 1;
        }
    }

    fn detach(&self, node_id: &str) {
        if let Some(mut status) = self.nodes.get_mut(node_id) {
            status.streams = status.streams.saturating_sub(1);
        }
        self.nodes.remove_if(node_id, |_, status| status.streams == 0);
    }
}

/// Build a response unless the caller already holds `known_version`.
fn respond(
    snapshot: &Snapshot,
    ty: ResourceType,
    known_version: &str,
    resource_names: &[String],
) -> Option<DiscoveryResponse> {
    if known_version == snapshot.version() {
        return None;
    }

    let resources = snapshot
        .resources(ty)
        .into_iter()
        .filter(|r| resource_names.is_empty() || resource_names.iter().any(|n| n == r.name()))
        .collect();

    Some(DiscoveryResponse {
        version_info: snapshot.version().to_string(),
        resources,
        type_url: ty.type_url().to_string(),
        nonce: uuid::Uuid::new_v4().to_string(),
    })
}

#[derive(Debug, Clone)]
struct Subscription {
    known_version: String,
    resource_names: Vec<String>,
}

/// One streaming connection: tracks the version sent per subscribed type
/// and pushes every newer snapshot, clusters before listeners.
pub struct StreamSession {
    responder: Arc<DiscoveryResponder>,
    changes: watch::Receiver<String>,
    node: Option<String>,
    subscriptions: HashMap<ResourceType, Subscription>,
}

impl StreamSession {
    pub fn node_id(&self) -> Option<&str> {
        self.node.as_deref()
    }

    /// Apply a request from the node and return whatever it should receive now.
    pub fn handle_request(&mut self, request: &DiscoveryRequest) -> Result<Vec<DiscoveryResponse>, DiscoveryError> {
        let ty = self.responder.accept(request)?;
        if self.node.is_none() {
            if let Some(node_id) = request.node_id() {
                self.responder.attach(node_id);
                self.node = Some(node_id.to_string());
            }
        }

        match self.subscriptions.get_mut(&ty) {
            Some(sub) if request.is_reply() => {
                // ACK or NACK of something we sent: the sent version stays known
                // so a rejected snapshot is not pushed again.
                if !request.resource_names.is_empty() {
                    sub.resource_names = request.resource_names.clone();
                }
            }
            _ => {
                self.subscriptions.insert(
                    ty,
                    Subscription {
                        known_version: request.version_info.clone(),
                        resource_names: request.resource_names.clone(),
                    },
                );
            }
        }

        Ok(self.pending())
    }

    /// Wait for a snapshot that yields at least one response.
    pub async fn next_change(&mut self) -> Result<Vec<DiscoveryResponse>, DiscoveryError> {
        loop {
            self.changes.changed().await.map_err(|_| DiscoveryError::Closed)?;
            self.changes.borrow_and_update();
            let pending = self.pending();
            if !pending.is_empty() {
                return Ok(pending);
            }
        }
    }

    /// Responses for every subscription behind the current snapshot, all
    /// built from one load of it.
    fn pending(&mut self) -> Vec<DiscoveryResponse> {
        let Some(snapshot) = self.responder.publisher.current() else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for ty in ResourceType::ALL {
            let Some(sub) = self.subscriptions.get_mut(&ty) else {
                continue;
            };
            if let Some(response) = respond(&snapshot, ty, &sub.known_version, &sub.resource_names) {
                sub.known_version = response.version_info.clone();
                metrics::record_discovery_request(ty.label(), "pushed");
                out.push(response);
            }
        }
        out
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if let Some(node_id) = &self.node {
            self.responder.detach(node_id);
        }
    }
}
