//! Discovery serving subsystem.
//!
//! # Data Flow
//! ```text
//! proxy node
//!     → server.rs     (REST pull or WebSocket stream, JSON bodies)
//!     → types.rs      (DiscoveryRequest)
//!     → responder.rs  (version comparison against the current snapshot)
//!     → DiscoveryResponse | "no change" | DiscoveryError
//! ```
//!
//! # Design Decisions
//! - Serving never waits on generation; it always reads the latest snapshot
//! - A malformed request fails only that caller

pub mod responder;
pub mod server;
pub mod types;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub use responder::{DiscoveryResponder, NodeStatus, StreamSession};
pub use server::DiscoveryServer;
pub use types::{DiscoveryRequest, DiscoveryResponse, Node, Status};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("request carries no node id")]
    MissingNode,

    #[error("unknown resource type {type_url}")]
    UnknownType { type_url: String },

    #[error("request for {got} sent to the {expected} endpoint")]
    TypeMismatch { expected: &'static str, got: String },

    #[error("malformed discovery request: {0}")]
    Malformed(String),

    #[error("snapshot publisher is gone")]
    Closed,
}

impl IntoResponse for DiscoveryError {
    fn into_response(self) -> Response {
        let status = match self {
            DiscoveryError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
