//! Sink supervisor: provisions one run of the sink and keeps it alive.
//!
//! A job goes through `Provisioning -> Downloading -> SettingUp -> Running`,
//! then alternates between `Running` and `Restarting` until it is stopped or
//! crashes too fast too often. Every transition is published on a watch
//! channel and logged.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ApiToken, Config, RestartPolicy, RestartTracker, SinkCommand, SupervisorPhase};
use crate::domain::ports::{BinaryProvisioner, SchemaRegistry, SinkProcess};

/// Everything a run loop needs once provisioning succeeded.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub schema: String,
    pub token: ApiToken,
}

/// Why a run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    StopRequested,
    RestartsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Launches of the `run` subcommand, across counter resets.
    pub attempts: u32,
    pub exit: LoopExit,
}

/// Composes schema allocation, binary provisioning and the sink process.
pub struct SinkSupervisor {
    config: Arc<Config>,
    registry: Arc<dyn SchemaRegistry>,
    provisioner: Arc<dyn BinaryProvisioner>,
    process: Arc<dyn SinkProcess>,
    policy: RestartPolicy,
    phase: watch::Sender<SupervisorPhase>,
}

impl SinkSupervisor {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<dyn SchemaRegistry>,
        provisioner: Arc<dyn BinaryProvisioner>,
        process: Arc<dyn SinkProcess>,
    ) -> Self {
        let policy = RestartPolicy {
            max_restarts: config.sink.max_restarts,
            reset_after: Duration::from_secs(config.sink.restart_reset_secs),
        };
        let (phase, _) = watch::channel(SupervisorPhase::Idle);

        Self {
            config,
            registry,
            provisioner,
            process,
            policy,
            phase,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RestartPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RestartPolicy {
        self.policy
    }

    pub fn phase(&self) -> SupervisorPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorPhase> {
        self.phase.subscribe()
    }

    fn transition(&self, next: SupervisorPhase) {
        let previous = self.phase.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "supervisor phase changed");
        }
    }

    /// Create the log and output directories and truncate the run log.
    pub async fn init(&self) -> DomainResult<()> {
        let sink = &self.config.sink;
        if let Some(parent) = sink.log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::create_dir_all(&sink.out_directory).await?;
        truncate(&sink.log_file).await
    }

    /// Provision a fresh namespace, make sure the binary is usable and run `setup`.
    ///
    /// Any failure here ends the job.
    pub async fn run_once(&self) -> DomainResult<PreparedRun> {
        let network = self.config.network.as_str();

        self.transition(SupervisorPhase::Provisioning);
        self.init().await?;
        let schema = self.registry.allocate_next_schema(network).await?;
        info!(network, schema = %schema, "provisioned schema");

        self.transition(SupervisorPhase::Downloading);
        self.provisioner.ensure_binary(&self.config.binary_os).await?;
        let token = self.provisioner.auth_token(&self.config)?;

        self.transition(SupervisorPhase::SettingUp);
        let setup = SinkCommand::Setup {
            dsn: self.config.database.sink_dsn(&schema),
            schema_file: self.config.sink.schema_file.clone(),
        };
        let exit = self.process.execute(&setup, &token).await?;
        if !exit.success() {
            return Err(DomainError::SetupFailed(format!("{exit} for schema {schema}")));
        }

        Ok(PreparedRun { schema, token })
    }

    fn run_command(&self, schema: &str) -> SinkCommand {
        SinkCommand::Run {
            dsn: self.config.database.sink_dsn(schema),
            endpoint: self.config.upstream_endpoint(),
            release_uri: self.config.release_uri.clone(),
            development_mode: self.config.sink.development_mode,
        }
    }

    /// Keep `run` alive until `stop` is set or the restart budget is spent.
    ///
    /// `stop` is only consulted between runs; a run in flight is not interrupted.
    pub async fn run_loop(&self, prepared: &PreparedRun, stop: &AtomicBool) -> RunSummary {
        let command = self.run_command(&prepared.schema);
        let mut tracker = RestartTracker::new(self.policy);
        let mut attempts = 0;

        loop {
            if stop.load(Ordering::Acquire) {
                self.transition(SupervisorPhase::Stopped);
                return RunSummary {
                    attempts,
                    exit: LoopExit::StopRequested,
                };
            }
            if !tracker.can_start() {
                warn!(
                    attempts,
                    max_restarts = self.policy.max_restarts,
                    schema = %prepared.schema,
                    "sink keeps exiting quickly, giving up"
                );
                self.transition(SupervisorPhase::Stopped);
                return RunSummary {
                    attempts,
                    exit: LoopExit::RestartsExhausted,
                };
            }

            if attempts > 0 {
                self.transition(SupervisorPhase::Restarting);
            }
            let streak = tracker.begin();
            attempts += 1;
            self.transition(SupervisorPhase::Running);

            let started = Instant::now();
            let result = self.process.execute(&command, &prepared.token).await;
            let elapsed = started.elapsed();

            match result {
                Ok(exit) if exit.success() => {
                    info!(attempt = streak, elapsed_ms = elapsed.as_millis() as u64, "sink run completed");
                    self.transition(SupervisorPhase::Completed);
                }
                Ok(exit) => {
                    warn!(attempt = streak, elapsed_ms = elapsed.as_millis() as u64, %exit, "sink run crashed");
                    self.transition(SupervisorPhase::Crashed);
                }
                Err(e) => {
                    warn!(attempt = streak, elapsed_ms = elapsed.as_millis() as u64, error = %e, "sink run failed");
                    self.transition(SupervisorPhase::Crashed);
                }
            }

            if tracker.finish(elapsed) {
                info!(elapsed_ms = elapsed.as_millis() as u64, "run lasted long enough, restart counter reset");
            }
        }
    }

    /// Provision and run until stopped. This is the body of a sink job.
    pub async fn run_job(&self, stop: &AtomicBool) -> DomainResult<RunSummary> {
        let span = tracing::info_span!("sink_job", run_id = %Uuid::new_v4(), network = %self.config.network);

        async {
            let prepared = match self.run_once().await {
                Ok(prepared) => prepared,
                Err(e) => {
                    self.transition(SupervisorPhase::Stopped);
                    return Err(e);
                }
            };
            Ok(self.run_loop(&prepared, stop).await)
        }
        .instrument(span)
        .await
    }
}

async fn truncate(path: &Path) -> DomainResult<()> {
    tokio::fs::File::create(path).await?;
    Ok(())
}
