use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::admin::AdminState;
use crate::discovery::NodeStatus;
use crate::manager::{CycleStatus, Trigger};
use crate::resources::{Cluster, Listener};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub snapshot_version: Option<String>,
    pub last_cycle: Option<CycleStatus>,
    pub nodes: BTreeMap<String, NodeStatus>,
}

#[derive(Serialize)]
pub struct SnapshotView<'a> {
    pub version: &'a str,
    pub listener: &'a Listener,
    pub clusters: &'a [Cluster],
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        snapshot_version: state.manager.publisher().current_version(),
        last_cycle: state.manager.last_status().map(|s| (*s).clone()),
        nodes: state.responder.nodes(),
    })
}

pub async fn get_snapshot(State(state): State<AdminState>) -> impl IntoResponse {
    match state.manager.publisher().current() {
        Some(snapshot) => Json(SnapshotView {
            version: snapshot.version(),
            listener: snapshot.listener(),
            clusters: snapshot.clusters(),
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no snapshot published yet" })),
        )
            .into_response(),
    }
}

pub async fn regenerate(State(state): State<AdminState>) -> impl IntoResponse {
    match state.triggers.send(Trigger::Admin) {
        Ok(()) => (StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "scheduled" }))),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "config manager is not running" })),
        ),
    }
}
