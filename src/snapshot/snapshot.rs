//! The immutable resource bundle served to proxies.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::resources::{Cluster, Listener, Resource, ResourceType};
use crate::snapshot::SnapshotError;

/// One listener and its clusters under one version.
///
/// Constructed only through [`Snapshot::new`], which guarantees every route
/// points at a cluster of the same snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: String,
    listener: Listener,
    clusters: Vec<Cluster>,
    fingerprint: u64,
}

impl Snapshot {
    pub fn new(version: impl Into<String>, listener: Listener, clusters: Vec<Cluster>) -> Result<Self, SnapshotError> {
        let version = version.into();
        if version.is_empty() {
            return Err(SnapshotError::EmptyVersion);
        }

        let names: HashSet<&str> = clusters.iter().map(|c| c.name.as_str()).collect();
        if let Some(dangling) = listener.referenced_clusters().find(|c| !names.contains(c)) {
            return Err(SnapshotError::DanglingCluster {
                cluster: dangling.to_string(),
            });
        }

        let encoded = serde_json::to_vec(&(&listener, &clusters)).map_err(SnapshotError::Encode)?;
        let mut hasher = DefaultHasher::new();
        encoded.hash(&mut hasher);

        Ok(Self {
            version,
            listener,
            clusters,
            fingerprint: hasher.finish(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Content hash of the listener and clusters, independent of the version.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.fingerprint == other.fingerprint && self.listener == other.listener && self.clusters == other.clusters
    }

    /// Resources of one type, in stable order.
    pub fn resources(&self, ty: ResourceType) -> Vec<Resource> {
        match ty {
            ResourceType::Listener => vec![Resource::Listener(self.listener.clone())],
            ResourceType::Cluster => self.clusters.iter().cloned().map(Resource::Cluster).collect(),
        }
    }

    pub fn resource_count(&self, ty: ResourceType) -> usize {
        match ty {
            ResourceType::Listener => 1,
            ResourceType::Cluster => self.clusters.len(),
        }
    }
}
