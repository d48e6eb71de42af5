//! JWKS resolution over plain HTTP.

use async_trait::async_trait;

use crate::sources::{FetchError, KeySource};

/// Fetches key sets with a GET request; anything but 200 is a failure.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    client: reqwest::Client,
}

impl HttpKeySource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch_jwks(&self, uri: &str) -> Result<String, FetchError> {
        tracing::debug!(uri = %uri, "Fetching JWKS");

        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: uri.to_string(),
                source,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                url: uri.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Http {
            url: uri.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetches_body_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_string("FAKEJWKS"))
            .mount(&server)
            .await;

        let source = HttpKeySource::new(reqwest::Client::new());
        let jwks = source.fetch_jwks(&format!("{}/jwks", server.uri())).await.unwrap();
        assert_eq!(jwks, "FAKEJWKS");
    }

    #[tokio::test]
    async fn test_non_ok_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpKeySource::new(reqwest::Client::new());
        let err = source.fetch_jwks(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }
}
