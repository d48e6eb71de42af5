//! Service specification sources.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{RolloutStrategy, ServiceConfig};
use crate::servicespec::ServiceSpecification;
use crate::sources::{FetchError, FetchedSpecification, SpecificationSource, TokenSource};

/// Fetches the specification from the service management API.
///
/// With [`RolloutStrategy::Fixed`] the configured config id is served; with
/// [`RolloutStrategy::Managed`] the config carrying the largest traffic share
/// of the latest successful rollout is.
pub struct HttpSpecificationSource {
    client: reqwest::Client,
    management_url: String,
    service_name: String,
    strategy: RolloutStrategy,
    config_id: Option<String>,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RolloutList {
    #[serde(default)]
    rollouts: Vec<Rollout>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Rollout {
    #[serde(default)]
    rollout_id: String,
    traffic_percent_strategy: Option<TrafficPercentStrategy>,
}

#[derive(Debug, Deserialize)]
struct TrafficPercentStrategy {
    #[serde(default)]
    percentages: BTreeMap<String, f64>,
}

impl HttpSpecificationSource {
    pub fn new(client: reqwest::Client, config: &ServiceConfig, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client,
            management_url: config.management_url.trim_end_matches('/').to_string(),
            service_name: config.name.clone(),
            strategy: config.rollout_strategy,
            config_id: config.config_id.clone(),
            tokens,
        }
    }

    fn config_url(&self, config_id: &str) -> String {
        format!(
            "{}/v1/services/{}/configs/{}?view=FULL",
            self.management_url, self.service_name, config_id
        )
    }

    fn rollouts_url(&self) -> String {
        format!(
            "{}/v1/services/{}/rollouts?filter=status=SUCCESS",
            self.management_url, self.service_name
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, token: &str) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| FetchError::Decode {
            origin: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn latest_config_id(&self, token: &str) -> Result<String, FetchError> {
        let list: RolloutList = self.get_json(&self.rollouts_url(), token).await?;
        let rollout = list.rollouts.into_iter().next().ok_or_else(|| FetchError::NoRollout {
            service: self.service_name.clone(),
        })?;

        let config_id = rollout
            .traffic_percent_strategy
            .and_then(|s| {
                // Largest share wins; ties go to the later config id.
                s.percentages
                    .into_iter()
                    .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
                    .map(|(id, _)| id)
            })
            .ok_or_else(|| FetchError::NoRollout {
                service: self.service_name.clone(),
            })?;

        tracing::debug!(rollout_id = %rollout.rollout_id, config_id = %config_id, "Resolved latest rollout");
        Ok(config_id)
    }
}

#[async_trait]
impl SpecificationSource for HttpSpecificationSource {
    async fn fetch(&self) -> Result<FetchedSpecification, FetchError> {
        let token = self.tokens.access_token().await?;

        let config_id = match (self.strategy, &self.config_id) {
            (RolloutStrategy::Fixed, Some(id)) => id.clone(),
            (RolloutStrategy::Fixed, None) => {
                return Err(FetchError::MissingConfigId {
                    service: self.service_name.clone(),
                })
            }
            (RolloutStrategy::Managed, _) => self.latest_config_id(&token.access_token).await?,
        };

        let spec: ServiceSpecification = self
            .get_json(&self.config_url(&config_id), &token.access_token)
            .await?;

        tracing::info!(service = %self.service_name, config_id = %config_id, "Fetched service specification");
        Ok(FetchedSpecification { config_id, spec })
    }
}

/// Reads the specification from a local JSON file.
///
/// The config id comes from the configuration if set, otherwise from the
/// document's own `id` field.
#[derive(Debug, Clone)]
pub struct FileSpecificationSource {
    path: PathBuf,
    config_id: Option<String>,
}

impl FileSpecificationSource {
    pub fn new(path: impl Into<PathBuf>, config_id: Option<String>) -> Self {
        Self {
            path: path.into(),
            config_id,
        }
    }
}

#[async_trait]
impl SpecificationSource for FileSpecificationSource {
    async fn fetch(&self) -> Result<FetchedSpecification, FetchError> {
        let origin = self.path.display().to_string();
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FetchError::Io {
                path: origin.clone(),
                source,
            })?;

        let spec: ServiceSpecification = serde_json::from_str(&content).map_err(|e| FetchError::Decode {
            origin: origin.clone(),
            reason: e.to_string(),
        })?;

        let config_id = self
            .config_id
            .clone()
            .or_else(|| spec.id.clone())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FetchError::MissingConfigId {
                service: spec.name.clone(),
            })?;

        Ok(FetchedSpecification { config_id, spec })
    }
}
