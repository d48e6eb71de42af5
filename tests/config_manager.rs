//! Generation cycles end to end: fake sources → manager → snapshot → responder.

use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use gateway_control_plane::config::RetryConfig;
use gateway_control_plane::discovery::{DiscoveryRequest, Node};
use gateway_control_plane::manager::{CycleError, CycleOutcome, Trigger};
use gateway_control_plane::resources::{CLUSTER_TYPE_URL, LISTENER_TYPE_URL};
use gateway_control_plane::sources::FetchError;

mod common;
use common::*;

fn request(type_url: &str, version: &str) -> DiscoveryRequest {
    DiscoveryRequest {
        version_info: version.into(),
        node: Some(Node {
            id: "proxy-test".into(),
            cluster: "ingress".into(),
        }),
        type_url: type_url.into(),
        ..DiscoveryRequest::default()
    }
}

/// Listener and clusters as served, as JSON.
fn served(h: &Harness) -> (String, Value, Value) {
    let listeners = h.responder.fetch(&request(LISTENER_TYPE_URL, "")).unwrap().unwrap();
    let clusters = h.responder.fetch(&request(CLUSTER_TYPE_URL, "")).unwrap().unwrap();
    assert_eq!(listeners.version_info, clusters.version_info);
    (
        listeners.version_info.clone(),
        serde_json::to_value(&listeners.resources).unwrap(),
        serde_json::to_value(&clusters.resources).unwrap(),
    )
}

fn http_filters(listeners: &Value) -> &Vec<Value> {
    listeners[0]["filterChains"][0]["filters"][0]["config"]["http_filters"]
        .as_array()
        .unwrap()
}

#[tokio::test]
async fn test_scenario_a_transcoding_and_http2() {
    let h = Harness::new(scenario_a());
    let outcome = h.manager.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Published { version: CONFIG_ID.into() });

    let (version, listeners, clusters) = served(&h);
    assert_eq!(version, CONFIG_ID);

    let filters = http_filters(&listeners);
    assert_eq!(filters.len(), 2);
    assert_eq!(
        filters[0],
        json!({
            "name": "envoy.grpc_json_transcoder",
            "config": {"proto_descriptor_bin": "rHVtbXk=", "services": [BOOKSTORE]}
        })
    );
    assert_eq!(filters[1], json!({"name": "envoy.router", "config": {}}));

    assert_eq!(clusters[0]["@type"], CLUSTER_TYPE_URL);
    assert_eq!(clusters[0]["name"], BOOKSTORE);
    assert_eq!(clusters[0]["http2ProtocolOptions"], json!({}));
    assert_eq!(clusters[0]["connectTimeout"], "20s");
}

#[tokio::test]
async fn test_scenario_b_full_audiences_bare_provider() {
    let h = Harness::new(scenario_b());
    h.manager.run_cycle().await.unwrap();

    let (_, listeners, _) = served(&h);
    let filters = http_filters(&listeners);
    assert_eq!(filters[0]["name"], "envoy.filters.http.jwt_authn");
    assert_eq!(
        filters[0]["config"],
        json!({
            "providers": {"firebase": {
                "audiences": ["a1", "a2"],
                "issuer": "https://test_issuer.google.com/",
                "local_jwks": {"inline_string": FAKE_JWKS}
            }},
            "rules": [{
                "match": {"prefix": "/endpoints.examples.bookstore.Bookstore/CreateShelf"},
                "requires": {"provider_name": "firebase"}
            }]
        })
    );
    assert_eq!(filters.last().unwrap()["name"], "envoy.router");
}

#[tokio::test]
async fn test_scenario_c_requires_any_in_order() {
    let h = Harness::new(scenario_c());
    h.manager.run_cycle().await.unwrap();

    let (_, listeners, _) = served(&h);
    let jwt = &http_filters(&listeners)[0]["config"];
    assert_eq!(
        jwt["rules"][0]["requires"],
        json!({"requires_any": {"requirements": [
            {"provider_name": "firebase1"},
            {"provider_name": "firebase2"}
        ]}})
    );
    assert_eq!(h.keys.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_usage_reporting_uses_token_descriptor() {
    let h = Harness::new(with_reporting(scenario_b()));
    h.manager.run_cycle().await.unwrap();

    let (_, listeners, _) = served(&h);
    let names: Vec<&str> = http_filters(&listeners)
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["envoy.filters.http.jwt_authn", "envoy.filters.http.service_control", "envoy.router"]
    );

    let usage = &http_filters(&listeners)[1]["config"];
    assert_eq!(usage["service_name"], SERVICE_NAME);
    assert_eq!(usage["services"][0]["token_uri"]["cluster"], "gcp_metadata_cluster");
    assert_eq!(
        usage["rules"][0]["requires"]["operation_name"],
        "endpoints.examples.bookstore.Bookstore.CreateShelf"
    );
}

#[tokio::test]
async fn test_fail_static_on_key_timeout() {
    let h = Harness::with_timeout(scenario_b(), Duration::from_millis(50));
    h.manager.run_cycle().await.unwrap();
    let before = served(&h);

    let mut changed = scenario_b();
    changed["authentication"]["providers"][0]["issuer"] = json!("https://rotated_issuer/");
    h.source.set("2017-05-02r0", changed);
    h.keys.set_delay(Some(Duration::from_millis(500)));

    let err = h.manager.run_cycle().await.unwrap_err();
    assert!(matches!(err, CycleError::Fetch(FetchError::Timeout { .. })));

    assert_eq!(served(&h), before);
    assert!(h.responder.fetch(&request(LISTENER_TYPE_URL, &before.0)).unwrap().is_none());

    let status = h.manager.last_status().unwrap();
    assert_eq!(status.outcome, "failed");
    assert_eq!(status.version.as_deref(), Some(CONFIG_ID));
}

#[tokio::test]
async fn test_fetch_failure_keeps_snapshot() {
    let h = Harness::new(scenario_a());
    h.manager.run_cycle().await.unwrap();

    h.source.set_failing(true);
    assert!(h.manager.run_cycle().await.is_err());
    assert_eq!(h.publisher.current_version().as_deref(), Some(CONFIG_ID));
}

#[tokio::test]
async fn test_validation_failure_keeps_snapshot() {
    let h = Harness::new(scenario_b());
    h.manager.run_cycle().await.unwrap();

    let mut broken = scenario_b();
    broken["authentication"]["rules"][0]["requirements"][0]["provider_id"] = json!("nobody");
    h.source.set("2017-05-02r0", broken);

    let err = h.manager.run_cycle().await.unwrap_err();
    assert!(matches!(err, CycleError::Generation(_)));
    assert_eq!(h.publisher.current_version().as_deref(), Some(CONFIG_ID));
}

#[tokio::test]
async fn test_versions_follow_config_ids() {
    let h = Harness::new(scenario_a());
    h.manager.run_cycle().await.unwrap();

    // Same input: nothing new to publish.
    assert_eq!(
        h.manager.run_cycle().await.unwrap(),
        CycleOutcome::Unchanged { version: CONFIG_ID.into() }
    );

    // New content under the same config id gets a derived version.
    let mut edited = scenario_a();
    edited["apis"][0]["syntax"] = json!("SYNTAX_PROTO2");
    h.source.set(CONFIG_ID, edited);
    assert_eq!(
        h.manager.run_cycle().await.unwrap(),
        CycleOutcome::Published { version: format!("{}#1", CONFIG_ID) }
    );

    h.source.set("2017-05-02r0", scenario_b());
    assert_eq!(
        h.manager.run_cycle().await.unwrap(),
        CycleOutcome::Published { version: "2017-05-02r0".into() }
    );
}

#[tokio::test]
async fn test_derived_versions_never_block_real_config_ids() {
    let h = Harness::new(scenario_a());
    h.manager.run_cycle().await.unwrap();

    let mut edited = scenario_a();
    edited["apis"][0]["syntax"] = json!("SYNTAX_PROTO2");
    h.source.set(CONFIG_ID, edited);
    let derived = h.manager.run_cycle().await.unwrap();
    assert_eq!(derived.version(), format!("{}#1", CONFIG_ID));

    // A config id that looks like a derived version is served as-is.
    let dotted = format!("{}.1", CONFIG_ID);
    h.source.set(&dotted, scenario_b());
    assert_eq!(
        h.manager.run_cycle().await.unwrap(),
        CycleOutcome::Published { version: dotted.clone() }
    );

    // A config id equal to an already served version gets a fresh one.
    h.source.set(&format!("{}#1", CONFIG_ID), scenario_c());
    assert_eq!(
        h.manager.run_cycle().await.unwrap(),
        CycleOutcome::Published { version: format!("{}#1#1", CONFIG_ID) }
    );
    assert_eq!(
        h.manager.run_cycle().await.unwrap(),
        CycleOutcome::Unchanged { version: format!("{}#1#1", CONFIG_ID) }
    );
}

#[tokio::test]
async fn test_token_failure_keeps_snapshot() {
    let h = Harness::new(scenario_b());
    h.manager.run_cycle().await.unwrap();

    h.source.set("2017-05-02r0", with_reporting(scenario_b()));
    h.tokens.set_failing(true);

    let err = h.manager.run_cycle().await.unwrap_err();
    assert!(matches!(err, CycleError::Fetch(FetchError::Status { status: 401, .. })));
    assert_eq!(h.publisher.current_version().as_deref(), Some(CONFIG_ID));
    assert_eq!(h.manager.last_status().unwrap().outcome, "failed");

    h.tokens.set_failing(false);
    assert_eq!(
        h.manager.run_cycle().await.unwrap(),
        CycleOutcome::Published { version: "2017-05-02r0".into() }
    );
}

#[tokio::test]
async fn test_generation_is_byte_identical() {
    let first = Harness::new(scenario_c());
    let second = Harness::new(scenario_c());
    first.manager.run_cycle().await.unwrap();
    second.manager.run_cycle().await.unwrap();

    let a = first.publisher.current().unwrap();
    let b = second.publisher.current().unwrap();
    assert_eq!(
        serde_json::to_vec(a.listener()).unwrap(),
        serde_json::to_vec(b.listener()).unwrap()
    );
    assert_eq!(
        serde_json::to_vec(a.clusters()).unwrap(),
        serde_json::to_vec(b.clusters()).unwrap()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_always_see_paired_resources() {
    let h = Harness::new(scenario_a());
    h.manager.run_cycle().await.unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let publisher = h.publisher.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    let snapshot = publisher.current().unwrap();
                    let names: Vec<&str> = snapshot.clusters().iter().map(|c| c.name.as_str()).collect();
                    for referenced in snapshot.listener().referenced_clusters() {
                        assert!(names.contains(&referenced));
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for i in 0..50 {
        let mut spec = scenario_a();
        spec["apis"][0]["name"] = json!(format!("endpoints.examples.bookstore.Bookstore{}", i));
        h.source.set(&format!("2017-06-{:02}r0", i), spec);
        h.manager.run_cycle().await.unwrap();
    }

    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test]
async fn test_run_loop_regenerates_on_trigger() {
    let h = Harness::new(scenario_a());
    let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut changes = h.publisher.subscribe();

    let task = tokio::spawn(Arc::clone(&h.manager).run(
        Duration::from_secs(3600),
        RetryConfig::default(),
        trigger_rx,
        shutdown_rx,
    ));

    tokio::time::timeout(Duration::from_secs(2), changes.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*changes.borrow_and_update(), CONFIG_ID);

    h.source.set("2017-05-02r0", scenario_b());
    trigger_tx.send(Trigger::Admin).unwrap();
    trigger_tx.send(Trigger::SpecChanged).unwrap();

    tokio::time::timeout(Duration::from_secs(2), changes.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*changes.borrow_and_update(), "2017-05-02r0");

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
}
