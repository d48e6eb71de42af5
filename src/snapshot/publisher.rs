//! Atomic installation of snapshots.

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::observability::metrics;
use crate::resources::{Cluster, Listener, ResourceType};
use crate::snapshot::{Snapshot, SnapshotError};

/// Versions remembered for reuse detection.
const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// Holds the snapshot currently served to every node.
///
/// `current()` is a lock-free load; `publish()` swaps the whole snapshot in
/// one store, so a reader sees either the old bundle or the new one.
pub struct SnapshotPublisher {
    current: ArcSwapOption<Snapshot>,
    /// Content fingerprint and install sequence of the most recent
    /// `history_limit` versions. Older versions are forgotten and may be
    /// installed again.
    history: DashMap<String, (u64, u64)>,
    history_limit: usize,
    installs: AtomicU64,
    changes: watch::Sender<String>,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(String::new());
        Self {
            current: ArcSwapOption::empty(),
            history: DashMap::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            installs: AtomicU64::new(0),
            changes,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Validate and install a new snapshot.
    ///
    /// Publishing the current version again with identical content is a
    /// no-op returning the installed snapshot.
    pub fn publish(
        &self,
        version: impl Into<String>,
        listener: Listener,
        clusters: Vec<Cluster>,
    ) -> Result<Arc<Snapshot>, SnapshotError> {
        let snapshot = Snapshot::new(version, listener, clusters)?;

        if let Some(installed) = self.current.load_full() {
            if installed.version() == snapshot.version() && installed.same_content(&snapshot) {
                return Ok(installed);
            }
        }

        let reused = self
            .history
            .get(snapshot.version())
            .is_some_and(|previous| previous.0 != snapshot.fingerprint());
        if reused {
            return Err(SnapshotError::VersionReuse {
                version: snapshot.version().to_string(),
            });
        }
        self.remember(snapshot.version(), snapshot.fingerprint());

        let snapshot = Arc::new(snapshot);
        self.current.store(Some(snapshot.clone()));
        self.changes.send_replace(snapshot.version().to_string());

        metrics::record_snapshot(
            snapshot.resource_count(ResourceType::Listener),
            snapshot.resource_count(ResourceType::Cluster),
        );
        tracing::info!(
            version = %snapshot.version(),
            clusters = snapshot.clusters().len(),
            "Snapshot published"
        );

        Ok(snapshot)
    }

    /// Whether `version` is still remembered as installed.
    pub fn knows_version(&self, version: &str) -> bool {
        self.history.contains_key(version)
    }

    fn remember(&self, version: &str, fingerprint: u64) {
        let seq = self.installs.fetch_add(1, Ordering::Relaxed) + 1;
        self.history.insert(version.to_string(), (fingerprint, seq));

        if self.history.len() > self.history_limit {
            let oldest_kept = seq.saturating_sub(self.history_limit as u64);
            self.history.retain(|_, (_, installed)| *installed > oldest_kept);
        }
    }

    /// The snapshot being served, if one was ever published.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    pub fn current_version(&self) -> Option<String> {
        self.current.load().as_ref().map(|s| s.version().to_string())
    }

    /// Receiver notified with the version of every newly installed snapshot.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.changes.subscribe()
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}
