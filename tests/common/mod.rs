//! Shared fakes and fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use gateway_control_plane::discovery::{DiscoveryResponder, DiscoveryServer};
use gateway_control_plane::generator::{ConfigGenerator, GeneratorOptions};
use gateway_control_plane::manager::ConfigManager;
use gateway_control_plane::resources::HttpUri;
use gateway_control_plane::servicespec::ServiceSpecification;
use gateway_control_plane::snapshot::SnapshotPublisher;
use gateway_control_plane::sources::{
    AccessToken, FetchError, FetchedSpecification, KeySource, SpecificationSource, TokenSource,
};
use gateway_control_plane::Shutdown;

pub const CONFIG_ID: &str = "2017-05-01r0";
pub const SERVICE_NAME: &str = "bookstore.endpoints.project123.cloud.goog";
pub const BOOKSTORE: &str = "endpoints.examples.bookstore.Bookstore";
pub const FAKE_JWKS: &str = r#"{"keys":[{"kty":"RSA","kid":"k1","n":"abc","e":"AQAB"}]}"#;

/// Serves whatever specification was last set.
pub struct FakeSpecSource {
    current: Mutex<FetchedSpecification>,
    failing: AtomicBool,
}

impl FakeSpecSource {
    pub fn new(config_id: &str, spec: Value) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(fetched(config_id, spec)),
            failing: AtomicBool::new(false),
        })
    }

    pub fn set(&self, config_id: &str, spec: Value) {
        *self.current.lock().unwrap() = fetched(config_id, spec);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

fn fetched(config_id: &str, spec: Value) -> FetchedSpecification {
    FetchedSpecification {
        config_id: config_id.to_string(),
        spec: serde_json::from_value::<ServiceSpecification>(spec).unwrap(),
    }
}

#[async_trait]
impl SpecificationSource for FakeSpecSource {
    async fn fetch(&self) -> Result<FetchedSpecification, FetchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Status {
                url: "fake://spec".into(),
                status: 503,
            });
        }
        Ok(self.current.lock().unwrap().clone())
    }
}

/// Returns a fixed key set, optionally after a delay.
pub struct FakeKeys {
    delay: Mutex<Option<Duration>>,
    pub calls: AtomicUsize,
}

impl FakeKeys {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl KeySource for FakeKeys {
    async fn fetch_jwks(&self, _uri: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(FAKE_JWKS.to_string())
    }
}

/// Hands out a fixed token unless told to fail.
pub struct FakeTokens {
    failing: AtomicBool,
}

impl FakeTokens {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            failing: AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenSource for FakeTokens {
    async fn access_token(&self) -> Result<AccessToken, FetchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Status {
                url: "fake://token".into(),
                status: 401,
            });
        }
        Ok(AccessToken {
            access_token: "ya29.fake".into(),
            expires_in: 3600,
            token_type: "Bearer".into(),
        })
    }

    fn token_uri(&self) -> HttpUri {
        HttpUri {
            cluster: "gcp_metadata_cluster".into(),
            timeout: Duration::from_secs(5),
            uri: "http://169.254.169.254/computeMetadata/v1/instance/service-accounts/default/token".into(),
        }
    }
}

/// A manager wired to fakes, plus handles to steer them.
pub struct Harness {
    pub source: Arc<FakeSpecSource>,
    pub keys: Arc<FakeKeys>,
    pub tokens: Arc<FakeTokens>,
    pub publisher: Arc<SnapshotPublisher>,
    pub manager: Arc<ConfigManager>,
    pub responder: Arc<DiscoveryResponder>,
}

impl Harness {
    pub fn new(spec: Value) -> Self {
        Self::with_timeout(spec, Duration::from_secs(5))
    }

    pub fn with_timeout(spec: Value, fetch_timeout: Duration) -> Self {
        let source = FakeSpecSource::new(CONFIG_ID, spec);
        let keys = FakeKeys::new();
        let tokens = FakeTokens::new();
        let publisher = Arc::new(SnapshotPublisher::new());
        let manager = Arc::new(
            ConfigManager::new(
                source.clone(),
                keys.clone(),
                tokens.clone(),
                ConfigGenerator::new(GeneratorOptions::default()),
                publisher.clone(),
            )
            .with_fetch_timeout(fetch_timeout),
        );
        let responder = Arc::new(DiscoveryResponder::new(publisher.clone()));

        Self {
            source,
            keys,
            tokens,
            publisher,
            manager,
            responder,
        }
    }
}

/// Start a discovery server on an ephemeral port.
pub async fn start_discovery(responder: Arc<DiscoveryResponder>, shutdown: Arc<Shutdown>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = DiscoveryServer::new(responder, shutdown);
    tokio::spawn(async move {
        server.run(listener).await.unwrap();
    });
    addr
}

pub fn discovery_request(type_url: &str, version: &str) -> Value {
    json!({
        "version_info": version,
        "node": {"id": "proxy-test", "cluster": "ingress"},
        "type_url": type_url
    })
}

/// One proto3 API with an attached descriptor.
pub fn scenario_a() -> Value {
    json!({
        "name": SERVICE_NAME,
        "id": CONFIG_ID,
        "apis": [{
            "name": BOOKSTORE,
            "version": "v1",
            "syntax": "SYNTAX_PROTO3",
            "methods": [{"name": "ListShelves"}, {"name": "CreateShelf"}]
        }],
        "http": {"rules": [
            {"selector": "endpoints.examples.bookstore.Bookstore.ListShelves", "get": "/v1/shelves"}
        ]},
        "sourceInfo": {"sourceFiles": [{
            "filePath": "api_descriptor.pb",
            "fileContents": "rHVtbXk=",
            "fileType": "FILE_DESCRIPTOR_SET_PROTO"
        }]}
    })
}

/// One provider declaring two audiences, one rule without an audience override.
pub fn scenario_b() -> Value {
    json!({
        "name": SERVICE_NAME,
        "apis": [{"name": BOOKSTORE, "methods": [{"name": "CreateShelf"}]}],
        "authentication": {
            "providers": [{
                "id": "firebase",
                "issuer": "https://test_issuer.google.com/",
                "jwks_uri": "https://test_jwks.google.com/",
                "audiences": "a1,a2"
            }],
            "rules": [{
                "selector": "endpoints.examples.bookstore.Bookstore.CreateShelf",
                "requirements": [{"provider_id": "firebase"}]
            }]
        }
    })
}

/// Two providers, one rule accepting either.
pub fn scenario_c() -> Value {
    json!({
        "name": SERVICE_NAME,
        "apis": [{"name": BOOKSTORE, "methods": [{"name": "CreateShelf"}]}],
        "authentication": {
            "providers": [
                {"id": "firebase1", "issuer": "https://issuer1/", "jwks_uri": "https://keys1/"},
                {"id": "firebase2", "issuer": "https://issuer2/", "jwks_uri": "https://keys2/"}
            ],
            "rules": [{
                "selector": "endpoints.examples.bookstore.Bookstore.CreateShelf",
                "requirements": [{"provider_id": "firebase1"}, {"provider_id": "firebase2"}]
            }]
        }
    })
}

/// Usage reporting enabled.
pub fn with_reporting(mut spec: Value) -> Value {
    spec["control"] = json!({"environment": "servicecontrol.googleapis.com"});
    spec
}
