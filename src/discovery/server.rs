//! Discovery transport.
//!
//! # Endpoints
//! - `POST /v2/discovery:listeners`, `POST /v2/discovery:clusters`: pull one
//!   resource type. `200` with a response, `304` when the node is current,
//!   `400` on a bad request.
//! - `GET /v2/discovery:stream`: WebSocket session. The node sends requests
//!   as JSON text frames; the server pushes responses whenever a newer
//!   snapshot is published.

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::discovery::{DiscoveryError, DiscoveryRequest, DiscoveryResponder, DiscoveryResponse};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::resources::ResourceType;

#[derive(Clone)]
struct ServerState {
    responder: Arc<DiscoveryResponder>,
    shutdown: Arc<Shutdown>,
}

/// HTTP server proxies connect to for their configuration.
pub struct DiscoveryServer {
    router: Router,
    shutdown: Arc<Shutdown>,
}

impl DiscoveryServer {
    pub fn new(responder: Arc<DiscoveryResponder>, shutdown: Arc<Shutdown>) -> Self {
        let state = ServerState {
            responder,
            shutdown: shutdown.clone(),
        };
        Self {
            router: Self::build_router(state),
            shutdown,
        }
    }

    fn build_router(state: ServerState) -> Router {
        Router::new()
            .route("/v2/discovery:listeners", post(fetch_listeners))
            .route("/v2/discovery:clusters", post(fetch_clusters))
            .route("/v2/discovery:stream", get(stream))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP until shutdown is triggered.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Discovery server starting");

        let mut shutdown = self.shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Discovery server stopped");
        Ok(())
    }

    /// Serve HTTPS until shutdown is triggered.
    pub async fn run_tls(self, addr: SocketAddr, tls: RustlsConfig) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "Discovery server starting with TLS");

        let handle = axum_server::Handle::new();
        let mut shutdown = self.shutdown.subscribe();
        let signal = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            signal.graceful_shutdown(Some(Duration::from_secs(5)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("Discovery server stopped");
        Ok(())
    }
}

async fn fetch_listeners(State(state): State<ServerState>, body: Bytes) -> Result<Response, DiscoveryError> {
    fetch_typed(&state, ResourceType::Listener, &body)
}

async fn fetch_clusters(State(state): State<ServerState>, body: Bytes) -> Result<Response, DiscoveryError> {
    fetch_typed(&state, ResourceType::Cluster, &body)
}

fn fetch_typed(state: &ServerState, ty: ResourceType, body: &[u8]) -> Result<Response, DiscoveryError> {
    let mut request: DiscoveryRequest =
        serde_json::from_slice(body).map_err(|e| DiscoveryError::Malformed(e.to_string()))?;

    if request.type_url.is_empty() {
        request.type_url = ty.type_url().to_string();
    } else if request.type_url != ty.type_url() {
        return Err(DiscoveryError::TypeMismatch {
            expected: ty.label(),
            got: request.type_url,
        });
    }

    match state.responder.fetch(&request) {
        Ok(Some(response)) => {
            tracing::debug!(
                node_id = request.node_id().unwrap_or_default(),
                type_url = %response.type_url,
                version = %response.version_info,
                "Serving resources"
            );
            Ok(Json(response).into_response())
        }
        Ok(None) => Ok(StatusCode::NOT_MODIFIED.into_response()),
        Err(e) => {
            tracing::warn!(error = %e, "Rejected discovery request");
            Err(e)
        }
    }
}

async fn stream(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_session(socket, state))
}

async fn stream_session(socket: WebSocket, state: ServerState) {
    metrics::stream_opened();
    let mut session = state.responder.session();
    let mut shutdown = state.shutdown.subscribe();
    let (mut sink, mut incoming) = socket.split();

    loop {
        let outgoing: Vec<String> = tokio::select! {
            frame = incoming.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<DiscoveryRequest>(text.as_str())
                        .map_err(|e| DiscoveryError::Malformed(e.to_string()))
                        .and_then(|request| session.handle_request(&request))
                    {
                        Ok(responses) => responses.iter().filter_map(encode).collect(),
                        Err(e) => {
                            tracing::warn!(node_id = session.node_id().unwrap_or_default(), error = %e, "Rejected stream request");
                            vec![serde_json::json!({ "error": e.to_string() }).to_string()]
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Stream receive failed");
                    break;
                }
            },
            changed = session.next_change() => match changed {
                Ok(responses) => responses.iter().filter_map(encode).collect(),
                Err(_) => break,
            },
            _ = shutdown.recv() => break,
        };

        for frame in outgoing {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                tracing::debug!(node_id = session.node_id().unwrap_or_default(), "Stream closed by peer");
                metrics::stream_closed();
                return;
            }
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    tracing::debug!(node_id = session.node_id().unwrap_or_default(), "Stream session ended");
    metrics::stream_closed();
}

/// Frame text for a response; a response that cannot be encoded is logged
/// and not sent.
fn encode(response: &DiscoveryResponse) -> Option<String> {
    match serde_json::to_string(response) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(
                type_url = %response.type_url,
                version = %response.version_info,
                error = %e,
                "Failed to encode discovery response"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::LISTENER_TYPE_URL;
    use crate::snapshot::fixtures::{cluster, listener_to};
    use crate::snapshot::SnapshotPublisher;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn router(publish: bool) -> Router {
        let publisher = Arc::new(SnapshotPublisher::new());
        if publish {
            publisher.publish("v1", listener_to(&["a.B"]), vec![cluster("a.B")]).unwrap();
        }
        let responder = Arc::new(DiscoveryResponder::new(publisher));
        DiscoveryServer::new(responder, Arc::new(Shutdown::new())).router()
    }

    fn post(path: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_listener_pull() {
        let response = router(true)
            .oneshot(post("/v2/discovery:listeners", serde_json::json!({"node": {"id": "n1"}})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["version_info"], "v1");
        assert_eq!(value["type_url"], LISTENER_TYPE_URL);
        assert_eq!(value["resources"][0]["@type"], LISTENER_TYPE_URL);
    }

    #[tokio::test]
    async fn test_current_version_is_not_modified() {
        let response = router(true)
            .oneshot(post(
                "/v2/discovery:clusters",
                serde_json::json!({"versionInfo": "v1", "node": {"id": "n1"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let malformed = router(true)
            .oneshot(
                Request::post("/v2/discovery:clusters")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

        let mismatch = router(true)
            .oneshot(post(
                "/v2/discovery:clusters",
                serde_json::json!({"node": {"id": "n1"}, "type_url": LISTENER_TYPE_URL}),
            ))
            .await
            .unwrap();
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);

        let anonymous = router(false)
            .oneshot(post("/v2/discovery:listeners", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(anonymous.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "request carries no node id");
    }

    #[test]
    fn test_encode_produces_frame_text() {
        let publisher = Arc::new(SnapshotPublisher::new());
        publisher.publish("v1", listener_to(&["a.B"]), vec![cluster("a.B")]).unwrap();
        let responder = DiscoveryResponder::new(publisher);
        let request = DiscoveryRequest {
            node: Some(crate::discovery::Node {
                id: "n1".into(),
                cluster: String::new(),
            }),
            type_url: crate::resources::CLUSTER_TYPE_URL.into(),
            ..DiscoveryRequest::default()
        };
        let response = responder.fetch(&request).unwrap().unwrap();

        let text = encode(&response).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["version_info"], "v1");
        assert_eq!(value["resources"][0]["name"], "a.B");
    }
}
