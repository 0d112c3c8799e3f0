use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::{FetchError, FetchResult};
use crate::fetcher::Fetcher;

/// JSON-over-HTTP fetcher: `GET {base_url}/{name}` with the response body
/// passed through as untyped JSON. The cache layer never interprets the
/// payload.
#[derive(Clone)]
pub struct HttpJsonFetcher {
    base_url: String,
    http: Client,
}

impl HttpJsonFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }
}

#[async_trait]
impl Fetcher<Value> for HttpJsonFetcher {
    async fn fetch(&self, name: &str) -> FetchResult<Value> {
        let response = self
            .http
            .get(self.url_for(name))
            .send()
            .await
            .map_err(|err| FetchError::network(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::not_found(name));
        }
        if !response.status().is_success() {
            return Err(FetchError::network(format!(
                "Fetch endpoint returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| FetchError::format(err.to_string()))
    }

    fn fetcher_name(&self) -> &str {
        "http-json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_returns_the_response_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pokemon/pikachu"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"name":"pikachu","number":25}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let fetcher = HttpJsonFetcher::new(format!("{}/pokemon", server.uri()));
        let value = fetcher.fetch("pikachu").await.unwrap();
        assert_eq!(value["name"], "pikachu");
        assert_eq!(value["number"], 25);
    }

    #[tokio::test]
    async fn missing_names_map_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpJsonFetcher::new(server.uri());
        let error = fetcher.fetch("missingno").await.unwrap_err();
        assert!(matches!(error, FetchError::NotFound { name } if name == "missingno"));
    }

    #[tokio::test]
    async fn server_errors_map_to_network_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpJsonFetcher::new(server.uri());
        let error = fetcher.fetch("pikachu").await.unwrap_err();
        assert!(matches!(error, FetchError::Network { .. }));
    }

    #[tokio::test]
    async fn non_json_bodies_map_to_format_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("not json", "text/plain"))
            .mount(&server)
            .await;

        let fetcher = HttpJsonFetcher::new(server.uri());
        let error = fetcher.fetch("pikachu").await.unwrap_err();
        assert!(matches!(error, FetchError::Format { .. }));
    }
}
