//! Binary provisioner backed by the release index.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, instrument};

use super::{ProvisionError, ReleaseIndexClient};
use crate::domain::errors::DomainResult;
use crate::domain::models::{ApiToken, Config};
use crate::domain::ports::BinaryProvisioner;

const EXECUTABLE_MODE: u32 = 0o755;

/// Downloads the sink binary next to `binary_path` when it is missing.
#[derive(Debug, Clone)]
pub struct ReleaseBinaryProvisioner {
    client: ReleaseIndexClient,
    binary_path: PathBuf,
}

impl ReleaseBinaryProvisioner {
    pub fn new(client: ReleaseIndexClient, binary_path: impl Into<PathBuf>) -> Self {
        Self {
            client,
            binary_path: binary_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ProvisionError> {
        let client = ReleaseIndexClient::new(&config.sink.release_index_url)?;
        Ok(Self::new(client, &config.sink.binary_path))
    }

    fn archive_path(&self) -> PathBuf {
        let mut archive: OsString = self.binary_path.clone().into_os_string();
        archive.push(".tar.gz");
        PathBuf::from(archive)
    }

    fn install_dir(&self) -> &Path {
        match self.binary_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    async fn is_present(&self) -> Result<bool, ProvisionError> {
        match tokio::fs::metadata(&self.binary_path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ProvisionError::Presence {
                path: self.binary_path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn download(&self, os_variant: &str) -> Result<(), ProvisionError> {
        let url = self.client.latest_asset_url(os_variant).await?;
        let archive = self.archive_path();
        info!(url = %url, archive = %archive.display(), "downloading sink binary");
        let bytes = self.client.download(&url, &archive).await?;
        debug!(bytes, "downloaded sink archive");

        self.extract(&archive).await
    }

    async fn extract(&self, archive: &Path) -> Result<(), ProvisionError> {
        let failed = |reason: String| ProvisionError::Extract {
            archive: archive.display().to_string(),
            reason,
        };

        info!(archive = %archive.display(), "extracting sink archive");
        let output = Command::new("tar")
            .arg("-xf")
            .arg(archive)
            .arg("-C")
            .arg(self.install_dir())
            .output()
            .await
            .map_err(|e| failed(format!("failed to execute tar: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "tar exited with {}. Error output: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn set_executable(&self) -> Result<(), ProvisionError> {
        tokio::fs::set_permissions(
            &self.binary_path,
            std::fs::Permissions::from_mode(EXECUTABLE_MODE),
        )
        .await
        .map_err(|e| ProvisionError::Permission {
            path: self.binary_path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl BinaryProvisioner for ReleaseBinaryProvisioner {
    #[instrument(skip(self), fields(binary = %self.binary_path.display()))]
    async fn ensure_binary(&self, os_variant: &str) -> DomainResult<()> {
        if self.is_present().await? {
            debug!("sink binary already present");
        } else {
            self.download(os_variant).await?;
        }

        self.set_executable().await?;
        Ok(())
    }

    fn auth_token(&self, config: &Config) -> DomainResult<ApiToken> {
        match &config.api_token {
            Some(token) if !token.is_empty() => Ok(token.clone()),
            _ => Err(ProvisionError::AuthTokenMissing.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;

    fn provisioner(index_url: &str, binary: &Path) -> ReleaseBinaryProvisioner {
        ReleaseBinaryProvisioner::new(ReleaseIndexClient::new(index_url).unwrap(), binary)
    }

    fn mode(path: &Path) -> u32 {
        std::fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_archive_path() {
        let p = provisioner("http://unused", Path::new("./substreams-sink-postgres"));
        assert_eq!(p.archive_path(), PathBuf::from("./substreams-sink-postgres.tar.gz"));
        assert_eq!(p.install_dir(), Path::new("."));

        let bare = provisioner("http://unused", Path::new("sink"));
        assert_eq!(bare.install_dir(), Path::new("."));
    }

    #[tokio::test]
    async fn test_present_binary_is_not_downloaded_but_made_executable() {
        let mut server = mockito::Server::new_async().await;
        let index = server.mock("GET", "/latest").expect(0).create_async().await;

        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("substreams-sink-postgres");
        std::fs::write(&binary, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o600)).unwrap();

        provisioner(&format!("{}/latest", server.url()), &binary)
            .ensure_binary("linux")
            .await
            .unwrap();

        assert_eq!(mode(&binary), 0o755);
        index.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_binary_is_downloaded_and_extracted() {
        let staging = tempfile::tempdir().unwrap();
        std::fs::write(staging.path().join("substreams-sink-postgres"), "#!/bin/sh\nexit 0\n").unwrap();
        let archive = staging.path().join("bundle.tar.gz");
        let status = std::process::Command::new("tar")
            .arg("-czf")
            .arg(&archive)
            .arg("-C")
            .arg(staging.path())
            .arg("substreams-sink-postgres")
            .status()
            .unwrap();
        assert!(status.success());
        let archive_bytes = std::fs::read(&archive).unwrap();

        let mut server = mockito::Server::new_async().await;
        let asset_url = format!("{}/download/substreams-sink-postgres_linux_x86_64.tar.gz", server.url());
        let _index = server
            .mock("GET", "/latest")
            .with_status(200)
            .with_body(format!(r#"{{"assets":[{{"browser_download_url":"{asset_url}"}}]}}"#))
            .create_async()
            .await;
        let _asset = server
            .mock("GET", "/download/substreams-sink-postgres_linux_x86_64.tar.gz")
            .with_status(200)
            .with_body(archive_bytes)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("substreams-sink-postgres");
        provisioner(&format!("{}/latest", server.url()), &binary)
            .ensure_binary("linux_x86_64")
            .await
            .unwrap();

        assert!(binary.exists());
        assert!(dir.path().join("substreams-sink-postgres.tar.gz").exists());
        assert_eq!(mode(&binary), 0o755);
    }

    #[tokio::test]
    async fn test_corrupt_archive_fails_extraction() {
        let mut server = mockito::Server::new_async().await;
        let asset_url = format!("{}/download/linux.tar.gz", server.url());
        let _index = server
            .mock("GET", "/latest")
            .with_status(200)
            .with_body(format!(r#"{{"assets":[{{"browser_download_url":"{asset_url}"}}]}}"#))
            .create_async()
            .await;
        let _asset = server
            .mock("GET", "/download/linux.tar.gz")
            .with_status(200)
            .with_body("not an archive")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("substreams-sink-postgres");
        let err = provisioner(&format!("{}/latest", server.url()), &binary)
            .ensure_binary("linux")
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::ProvisioningFailed(ref m) if m.contains("Failed to extract")));
    }

    #[test]
    fn test_auth_token_required() {
        let p = provisioner("http://unused", Path::new("sink"));
        let mut config = Config::default();

        let err = p.auth_token(&config).unwrap_err();
        assert!(err.to_string().contains("SUBSTREAMS_API_TOKEN is not set"));

        config.api_token = Some(ApiToken::new("  "));
        assert!(p.auth_token(&config).is_err());

        config.api_token = Some(ApiToken::new("abc"));
        assert_eq!(p.auth_token(&config).unwrap().expose(), "abc");
    }
}
