//! External collaborators consumed during a generation cycle.
//!
//! # Data Flow
//! ```text
//! ConfigManager (one cycle)
//!     → SpecificationSource::fetch     (management API or local file)
//!     → KeySource::fetch_jwks          (once per auth provider)
//!     → TokenSource::access_token      (only when usage reporting is on)
//!     → everything resolved → ConfigGenerator (pure)
//! ```
//!
//! # Design Decisions
//! - Capabilities are traits injected as `Arc<dyn _>`; tests pass fakes
//! - Sources never apply their own retry policy; the cycle is the unit of retry
//! - Deadlines are applied by the caller (`resilience::with_timeout`)

pub mod keys;
pub mod specification;
pub mod token;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::resources::HttpUri;
use crate::servicespec::ServiceSpecification;

pub use keys::HttpKeySource;
pub use specification::{FileSpecificationSource, HttpSpecificationSource};
pub use token::{AccessToken, MetadataTokenSource};

/// Errors raised while fetching external inputs.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection or transport failure.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The remote side answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The body could not be decoded.
    #[error("failed to decode response from {origin}: {reason}")]
    Decode { origin: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    /// No config id was configured and the specification carries none.
    #[error("no config id available for service {service}")]
    MissingConfigId { service: String },

    #[error("no successful rollout found for service {service}")]
    NoRollout { service: String },
}

/// A specification together with the config id it was fetched under.
#[derive(Debug, Clone)]
pub struct FetchedSpecification {
    pub config_id: String,
    pub spec: ServiceSpecification,
}

/// Fetches the service specification to translate.
#[async_trait]
pub trait SpecificationSource: Send + Sync {
    async fn fetch(&self) -> Result<FetchedSpecification, FetchError>;
}

/// Resolves the signing-key set published at a JWKS URI.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Returns the raw JWKS document.
    async fn fetch_jwks(&self, uri: &str) -> Result<String, FetchError>;
}

/// Resolves access tokens for outbound calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken, FetchError>;

    /// Where the proxy itself obtains tokens for its reporting calls.
    fn token_uri(&self) -> HttpUri;
}
