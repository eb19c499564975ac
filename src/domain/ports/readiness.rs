//! Readiness port.

use async_trait::async_trait;

use crate::domain::models::Readiness;

/// Reports whether the sink is close enough to the chain head.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    async fn check(&self) -> Readiness;
}
