//! The sink run loop as a `Job` for the lifecycle manager.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use super::sink_supervisor::{LoopExit, SinkSupervisor};
use crate::domain::errors::DomainResult;
use crate::domain::ports::{Job, JobFactory};

/// One supervised execution of the sink. Holds its own stop flag; the
/// restart state lives inside the run loop.
pub struct SinkJob {
    name: String,
    supervisor: Arc<SinkSupervisor>,
    stopped: AtomicBool,
}

impl SinkJob {
    pub fn new(name: impl Into<String>, supervisor: Arc<SinkSupervisor>) -> Self {
        Self {
            name: name.into(),
            supervisor,
            stopped: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Job for SinkJob {
    async fn start(&self) -> DomainResult<()> {
        let summary = self.supervisor.run_job(&self.stopped).await?;
        match summary.exit {
            LoopExit::StopRequested => info!(job = %self.name, attempts = summary.attempts, "sink job stopped"),
            LoopExit::RestartsExhausted => {
                info!(job = %self.name, attempts = summary.attempts, "sink job ended after too many restarts");
            }
        }
        Ok(())
    }

    async fn stop(&self) -> DomainResult<()> {
        self.stopped.store(true, Ordering::Release);
        Ok(())
    }
}

/// Factory creating a fresh `SinkJob` per name, all sharing `supervisor`.
pub fn sink_job_factory(supervisor: Arc<SinkSupervisor>) -> JobFactory {
    Arc::new(move |name: &str| -> Arc<dyn Job> { Arc::new(SinkJob::new(name, supervisor.clone())) })
}
