//! Generation cycle orchestration.
//!
//! # Data Flow
//! ```text
//! Trigger (interval, file change, SIGHUP, admin)
//!     → fetch specification            (SpecificationSource, with deadline)
//!     → resolve keys and token         (KeySource / TokenSource, with deadline)
//!     → ConfigGenerator::generate      (pure)
//!     → version derivation
//!     → SnapshotPublisher::publish     (atomic swap)
//! ```
//!
//! # Design Decisions
//! - One cycle at a time; triggers arriving during a cycle are coalesced
//! - Any failure leaves the current snapshot in place (fail-static)
//! - A failed cycle is retried with backoff, never later than the regular interval

pub mod config_manager;

use serde::Serialize;
use thiserror::Error;

use crate::generator::GenerationError;
use crate::snapshot::SnapshotError;
use crate::sources::FetchError;

pub use config_manager::ConfigManager;

/// Reasons to run a cycle outside the regular schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The local specification file changed.
    SpecChanged,
    /// SIGHUP.
    Reload,
    /// Requested through the admin API.
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new snapshot is being served.
    Published { version: String },
    /// The generated content equals the served snapshot.
    Unchanged { version: String },
}

impl CycleOutcome {
    pub fn version(&self) -> &str {
        match self {
            CycleOutcome::Published { version } | CycleOutcome::Unchanged { version } => version,
        }
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl CycleError {
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Fetch(_) => "fetch",
            CycleError::Generation(_) => "generation",
            CycleError::Snapshot(_) => "snapshot",
        }
    }
}

/// Summary of the last finished cycle, for operators.
#[derive(Debug, Clone, Serialize)]
pub struct CycleStatus {
    /// "published", "unchanged" or "failed".
    pub outcome: &'static str,
    pub config_id: Option<String>,
    pub version: Option<String>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub finished_at_unix: u64,
}
