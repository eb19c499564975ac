//! Long-running job port used by the job lifecycle manager.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::errors::DomainResult;

/// A named unit of work that runs until it finishes or is asked to stop.
#[async_trait]
pub trait Job: Send + Sync {
    /// Run the job. The job ends when this returns.
    async fn start(&self) -> DomainResult<()>;

    /// Signal the job to end. Returns without waiting for `start` to return.
    async fn stop(&self) -> DomainResult<()>;
}

/// Builds a fresh job instance for a job name.
pub type JobFactory = Arc<dyn Fn(&str) -> Arc<dyn Job> + Send + Sync>;
