//! Operator API.
//!
//! - `GET /admin/status`: build version, served snapshot version, last cycle, known nodes
//! - `GET /admin/snapshot`: the served listener and clusters
//! - `POST /admin/regenerate`: schedule a generation cycle

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::mpsc;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::discovery::DiscoveryResponder;
use crate::manager::{ConfigManager, Trigger};

#[derive(Clone)]
pub struct AdminState {
    pub manager: Arc<ConfigManager>,
    pub responder: Arc<DiscoveryResponder>,
    pub triggers: mpsc::UnboundedSender<Trigger>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/snapshot", get(get_snapshot))
        .route("/admin/regenerate", post(regenerate))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
