//! Reconciles a desired set of job names against running jobs.
//!
//! Each job runs in its own task. When its `start` returns, the task reports
//! back over a channel to a reaper that drops the job from the live map, but
//! only if the map still holds that same instance. Instances are told apart
//! by a generation number, so a late completion never removes a newer job
//! registered under the same name.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info};

use crate::domain::errors::DomainResult;
use crate::domain::ports::{Job, JobFactory};

struct TrackedJob {
    generation: u64,
    job: Arc<dyn Job>,
}

struct JobCompletion {
    name: String,
    generation: u64,
    outcome: Result<DomainResult<()>, JoinError>,
}

type LiveJobs = Arc<Mutex<HashMap<String, TrackedJob>>>;

/// Starts missing jobs, stops withdrawn ones and forgets finished ones.
///
/// Must be created inside a tokio runtime.
pub struct JobLifecycleManager {
    name: String,
    factory: JobFactory,
    jobs: LiveJobs,
    next_generation: AtomicU64,
    completions: mpsc::UnboundedSender<JobCompletion>,
    reaper: JoinHandle<()>,
}

impl JobLifecycleManager {
    pub fn new(name: impl Into<String>, factory: JobFactory) -> Self {
        let name = name.into();
        let jobs: LiveJobs = Arc::default();
        let (completions, rx) = mpsc::unbounded_channel();
        let reaper = tokio::spawn(reap(name.clone(), jobs.clone(), rx));

        Self {
            name,
            factory,
            jobs,
            next_generation: AtomicU64::new(0),
            completions,
            reaper,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn live(&self) -> MutexGuard<'_, HashMap<String, TrackedJob>> {
        lock(&self.jobs)
    }

    /// Converge the running jobs onto `desired`. Returns without waiting for
    /// any job to start or stop.
    pub fn set_desired_jobs(&self, desired: &HashSet<String>) {
        let mut jobs = self.live();

        let withdrawn: Vec<String> = jobs.keys().filter(|name| !desired.contains(*name)).cloned().collect();
        for name in withdrawn {
            if let Some(tracked) = jobs.remove(&name) {
                info!(manager = %self.name, job = %name, generation = tracked.generation, "Stopping job");
                let manager = self.name.clone();
                tokio::spawn(async move {
                    if let Err(e) = tracked.job.stop().await {
                        error!(manager = %manager, job = %name, error = %e, "failed to stop job");
                    }
                });
            }
        }

        for name in desired {
            if jobs.contains_key(name) {
                continue;
            }
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            info!(manager = %self.name, job = %name, generation, "Creating job");

            let job = (self.factory)(name);
            self.launch(name.clone(), generation, job.clone());
            jobs.insert(name.clone(), TrackedJob { generation, job });
        }
    }

    fn launch(&self, name: String, generation: u64, job: Arc<dyn Job>) {
        let completions = self.completions.clone();
        let task = tokio::spawn(async move { job.start().await });
        tokio::spawn(async move {
            let outcome = task.await;
            let _ = completions.send(JobCompletion {
                name,
                generation,
                outcome,
            });
        });
    }

    pub fn running_jobs(&self) -> HashSet<String> {
        self.live().keys().cloned().collect()
    }

    /// Stop every tracked job and forget it. Stop failures are logged.
    pub async fn stop(&self) {
        let drained: Vec<(String, TrackedJob)> = self.live().drain().collect();
        for (name, tracked) in drained {
            info!(manager = %self.name, job = %name, "Stopping job");
            if let Err(e) = tracked.job.stop().await {
                error!(manager = %self.name, job = %name, error = %e, "failed to stop job");
            }
        }
    }
}

impl Drop for JobLifecycleManager {
    fn drop(&mut self) {
        self.reaper.abort();
    }
}

fn lock(jobs: &LiveJobs) -> MutexGuard<'_, HashMap<String, TrackedJob>> {
    jobs.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn reap(manager: String, jobs: LiveJobs, mut rx: mpsc::UnboundedReceiver<JobCompletion>) {
    while let Some(completion) = rx.recv().await {
        let JobCompletion {
            name,
            generation,
            outcome,
        } = completion;

        match outcome {
            Ok(Ok(())) => info!(manager = %manager, job = %name, generation, "Job finished"),
            Ok(Err(e)) => error!(manager = %manager, job = %name, generation, error = %e, "Job failed"),
            Err(e) => error!(manager = %manager, job = %name, generation, error = %e, "Job task aborted"),
        }

        let mut live = lock(&jobs);
        if live.get(&name).is_some_and(|tracked| tracked.generation == generation) {
            live.remove(&name);
        } else {
            debug!(manager = %manager, job = %name, generation, "completion of a replaced job ignored");
        }
    }
}
