//! Client for the release index of the sink binary.

use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use super::ProvisionError;

const USER_AGENT: &str = concat!("sink-supervisor/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    tag_name: Option<String>,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    browser_download_url: String,
}

/// Fetches the latest release metadata and its assets.
#[derive(Debug, Clone)]
pub struct ReleaseIndexClient {
    http: Client,
    index_url: String,
}

impl ReleaseIndexClient {
    pub fn new(index_url: impl Into<String>) -> Result<Self, ProvisionError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ProvisionError::ReleaseIndex(e.to_string()))?;

        Ok(Self {
            http,
            index_url: index_url.into(),
        })
    }

    /// Download URL of the latest release asset whose URL contains `os_variant`.
    #[instrument(skip(self))]
    pub async fn latest_asset_url(&self, os_variant: &str) -> Result<String, ProvisionError> {
        let response = self
            .http
            .get(&self.index_url)
            .send()
            .await
            .map_err(|e| ProvisionError::ReleaseIndex(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::ReleaseIndex(status.to_string()));
        }

        let release: Release = response
            .json()
            .await
            .map_err(|e| ProvisionError::ReleaseIndex(e.to_string()))?;
        debug!(tag = ?release.tag_name, assets = release.assets.len(), "fetched release index");

        select_asset(&release.assets, os_variant)
            .map(str::to_string)
            .ok_or_else(|| ProvisionError::AssetNotFound(os_variant.to_string()))
    }

    /// Fetch `url` and write the body to `destination`.
    #[instrument(skip(self, destination), fields(destination = %destination.display()))]
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64, ProvisionError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ProvisionError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::Download(status.to_string()));
        }

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| ProvisionError::Download(e.to_string()))?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ProvisionError::Download(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ProvisionError::Download(e.to_string()))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ProvisionError::Download(e.to_string()))?;

        Ok(written)
    }
}

fn select_asset<'a>(assets: &'a [ReleaseAsset], os_variant: &str) -> Option<&'a str> {
    assets
        .iter()
        .map(|asset| asset.browser_download_url.as_str())
        .find(|url| url.contains(os_variant))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE_BODY: &str = r#"{
        "tag_name": "v2.5.0",
        "assets": [
            {"browser_download_url": "https://dl/substreams-sink-postgres_darwin_arm64.tar.gz"},
            {"browser_download_url": "https://dl/substreams-sink-postgres_linux_x86_64.tar.gz"}
        ]
    }"#;

    #[tokio::test]
    async fn test_latest_asset_url_matches_os_variant() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/releases/latest")
            .match_header("user-agent", mockito::Matcher::Regex("sink-supervisor/.*".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(RELEASE_BODY)
            .create_async()
            .await;

        let client = ReleaseIndexClient::new(format!("{}/releases/latest", server.url())).unwrap();
        let url = client
            .latest_asset_url("substreams-sink-postgres_linux_x86_64")
            .await
            .unwrap();

        assert_eq!(url, "https://dl/substreams-sink-postgres_linux_x86_64.tar.gz");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_latest_asset_url_without_match() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/releases/latest")
            .with_status(200)
            .with_body(RELEASE_BODY)
            .create_async()
            .await;

        let client = ReleaseIndexClient::new(format!("{}/releases/latest", server.url())).unwrap();
        let err = client.latest_asset_url("windows").await.unwrap_err();
        assert!(matches!(err, ProvisionError::AssetNotFound(_)));
    }

    #[tokio::test]
    async fn test_release_index_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/releases/latest")
            .with_status(403)
            .create_async()
            .await;

        let client = ReleaseIndexClient::new(format!("{}/releases/latest", server.url())).unwrap();
        let err = client.latest_asset_url("linux").await.unwrap_err();
        assert!(err.to_string().contains("Failed to fetch latest release information"));
    }

    #[tokio::test]
    async fn test_download_writes_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/asset.tar.gz")
            .with_status(200)
            .with_body("archive-bytes")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("sink.tar.gz");
        let client = ReleaseIndexClient::new(server.url()).unwrap();
        let written = client
            .download(&format!("{}/asset.tar.gz", server.url()), &destination)
            .await
            .unwrap();

        assert_eq!(written, 13);
        assert_eq!(std::fs::read_to_string(destination).unwrap(), "archive-bytes");
    }
}
