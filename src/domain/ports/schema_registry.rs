//! Schema registry port - which namespace each network writes into.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::NetworkSchema;

/// Assigns and records the active schema namespace of each network.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Active namespace of `network`, if it was ever provisioned.
    async fn current_schema(&self, network: &str) -> DomainResult<Option<NetworkSchema>>;

    /// Create the next namespace for `network`, make it the active one and
    /// return its name.
    ///
    /// Every call advances the suffix; two calls yield two distinct namespaces.
    async fn allocate_next_schema(&self, network: &str) -> DomainResult<String>;
}
