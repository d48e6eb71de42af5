//! Access tokens from the instance metadata server.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::MetadataConfig;
use crate::resources::HttpUri;
use crate::sources::{FetchError, TokenSource};

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// A bearer token and its lifetime as reported by the metadata server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
}

/// Fetches service-account tokens from the metadata server, reusing a token
/// until it is close to expiry.
pub struct MetadataTokenSource {
    client: reqwest::Client,
    token_url: String,
    cluster: String,
    timeout: Duration,
    cached: Mutex<Option<(AccessToken, Instant)>>,
}

impl MetadataTokenSource {
    pub fn new(client: reqwest::Client, config: &MetadataConfig) -> Self {
        Self {
            client,
            token_url: config.token_url.clone(),
            cluster: config.cluster.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            cached: Mutex::new(None),
        }
    }

    async fn request_token(&self) -> Result<AccessToken, FetchError> {
        let response = self
            .client
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: self.token_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.token_url.clone(),
                status: status.as_u16(),
            });
        }

        response
            .json::<AccessToken>()
            .await
            .map_err(|e| FetchError::Decode {
                origin: self.token_url.clone(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn access_token(&self) -> Result<AccessToken, FetchError> {
        let mut cached = self.cached.lock().await;
        if let Some((token, expires_at)) = cached.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < *expires_at {
                return Ok(token.clone());
            }
        }

        let token = self.request_token().await?;
        let expires_at = Instant::now() + Duration::from_secs(token.expires_in);
        tracing::debug!(expires_in = token.expires_in, "Fetched access token");
        *cached = Some((token.clone(), expires_at));
        Ok(token)
    }

    fn token_uri(&self) -> HttpUri {
        HttpUri {
            cluster: self.cluster.clone(),
            timeout: self.timeout,
            uri: self.token_url.clone(),
        }
    }
}
