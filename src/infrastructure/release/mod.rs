//! Sink binary provisioning from the latest upstream release.

pub mod client;
pub mod provisioner;

pub use client::ReleaseIndexClient;
pub use provisioner::ReleaseBinaryProvisioner;

use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Failed to fetch latest release information: {0}")]
    ReleaseIndex(String),

    #[error("No release asset matches {0}")]
    AssetNotFound(String),

    #[error("Failed to download binary: {0}")]
    Download(String),

    #[error("Failed to extract {archive}: {reason}")]
    Extract { archive: String, reason: String },

    #[error("Failed to set executable permission on {path}: {reason}")]
    Permission { path: String, reason: String },

    #[error("Failed to check for binary at {path}: {reason}")]
    Presence { path: String, reason: String },

    #[error("Failed to set authentication key: SUBSTREAMS_API_TOKEN is not set")]
    AuthTokenMissing,
}

impl From<ProvisionError> for DomainError {
    fn from(err: ProvisionError) -> Self {
        Self::ProvisioningFailed(err.to_string())
    }
}
