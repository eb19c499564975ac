//! Read-only access to the tables the sink populates.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CatalogView, JsonRow};

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Rows of `view` from the active namespace; empty when nothing was provisioned yet.
    async fn fetch(&self, view: CatalogView) -> DomainResult<Vec<JsonRow>>;
}
