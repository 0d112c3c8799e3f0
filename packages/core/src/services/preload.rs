use async_trait::async_trait;
use reqwest::Client;

use crate::error::{FetchError, FetchResult};
use crate::image::AssetPreloader;

/// HTTP asset preloader.
///
/// Downloads the asset once so it is warm wherever the transport layer
/// caches it, then resolves with the locator the consumer should render.
#[derive(Clone)]
pub struct HttpAssetPreloader {
    http: Client,
}

impl HttpAssetPreloader {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for HttpAssetPreloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetPreloader for HttpAssetPreloader {
    async fn preload(&self, url: &str) -> FetchResult<String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::asset(err.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::asset(format!(
                "Asset endpoint returned HTTP {}",
                response.status()
            )));
        }

        // Drain the body so the asset is fully transferred before the
        // consumer renders a reference to it.
        response
            .bytes()
            .await
            .map_err(|err| FetchError::asset(err.to_string()))?;

        Ok(url.to_string())
    }

    fn preloader_name(&self) -> &str {
        "http-asset"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn preload_resolves_with_the_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sprites/25.png"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(vec![0u8; 64], "image/png"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/sprites/25.png", server.uri());
        let preloader = HttpAssetPreloader::new();
        assert_eq!(preloader.preload(&url).await.unwrap(), url);
    }

    #[tokio::test]
    async fn missing_assets_map_to_asset_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/sprites/0.png", server.uri());
        let error = HttpAssetPreloader::new().preload(&url).await.unwrap_err();
        assert!(matches!(error, FetchError::Asset { .. }));
    }
}
