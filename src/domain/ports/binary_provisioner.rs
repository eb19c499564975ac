//! Binary provisioner port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ApiToken, Config};

/// Makes the versioned sink binary available and resolves its credentials.
#[async_trait]
pub trait BinaryProvisioner: Send + Sync {
    /// Download and unpack the binary for `os_variant` unless it is already
    /// present, then mark it executable.
    async fn ensure_binary(&self, os_variant: &str) -> DomainResult<()>;

    /// Token the binary authenticates with. Fails when none is configured.
    fn auth_token(&self, config: &Config) -> DomainResult<ApiToken>;
}
