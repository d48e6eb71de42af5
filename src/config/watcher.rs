//! Specification file watcher for hot regeneration.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::manager::Trigger;

/// Watches a local service specification and asks the config manager for a
/// new generation cycle whenever it changes.
///
/// The watcher never parses the file itself; a broken edit is caught by the
/// cycle and the current snapshot keeps being served.
pub struct SpecWatcher {
    path: PathBuf,
    trigger_tx: mpsc::UnboundedSender<Trigger>,
}

impl SpecWatcher {
    pub fn new(path: &Path, trigger_tx: mpsc::UnboundedSender<Trigger>) -> Self {
        Self {
            path: path.to_path_buf(),
            trigger_tx,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as events are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.trigger_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Specification file change detected, scheduling regeneration");
                        let _ = tx.send(Trigger::SpecChanged);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Specification watcher started");
        Ok(watcher)
    }
}
