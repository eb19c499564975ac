//! Common test utilities for integration tests
//!
//! Fakes for the supervisor's ports and a config rooted in a temp dir.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sink_supervisor::domain::errors::{DomainError, DomainResult};
use sink_supervisor::domain::models::{ApiToken, Config, ExitResult, SinkCommand};
use sink_supervisor::domain::ports::{BinaryProvisioner, SinkProcess};

/// Config whose log file and output directory live under `dir`.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.api_token = Some(ApiToken::new("test-token"));
    config.database.user = "sink".to_string();
    config.database.password = "secret".to_string();
    config.database.host = "db".to_string();
    config.database.database = "indexer".to_string();
    config.sink.log_file = dir.join("logs").join("sink.txt");
    config.sink.out_directory = dir.join("out");
    config
}

/// Provisioner that never touches the network.
#[derive(Default)]
pub struct FakeProvisioner {
    pub ensure_calls: AtomicU32,
    pub fail_ensure: bool,
}

#[async_trait]
impl BinaryProvisioner for FakeProvisioner {
    async fn ensure_binary(&self, _os_variant: &str) -> DomainResult<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_ensure {
            return Err(DomainError::ProvisioningFailed("download failed".to_string()));
        }
        Ok(())
    }

    fn auth_token(&self, config: &Config) -> DomainResult<ApiToken> {
        config
            .api_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| DomainError::ProvisioningFailed("SUBSTREAMS_API_TOKEN is not set".to_string()))
    }
}

/// One scripted `run` invocation: how long it takes and how it ends.
#[derive(Clone)]
pub struct RunStep {
    pub duration: Duration,
    pub outcome: Result<ExitResult, String>,
}

impl RunStep {
    pub fn crash_after(secs: u64) -> Self {
        Self {
            duration: Duration::from_secs(secs),
            outcome: Ok(ExitResult::Code(1)),
        }
    }

    pub fn exit_ok_after(secs: u64) -> Self {
        Self {
            duration: Duration::from_secs(secs),
            outcome: Ok(ExitResult::Code(0)),
        }
    }

    pub fn time_out_after(secs: u64) -> Self {
        Self {
            duration: Duration::from_secs(secs),
            outcome: Err("Process did not finish".to_string()),
        }
    }
}

/// `SinkProcess` that replays a script on the (usually paused) tokio clock.
pub struct ScriptedProcess {
    pub setup_exit: ExitResult,
    plan: Mutex<VecDeque<RunStep>>,
    fallback: RunStep,
    pub commands: Mutex<Vec<SinkCommand>>,
    pub tokens: Mutex<Vec<String>>,
    stop_after: Option<(u32, Arc<AtomicBool>)>,
    runs: AtomicU32,
}

impl ScriptedProcess {
    /// Every run crashes after `fallback`, unless `plan` says otherwise.
    pub fn new(plan: Vec<RunStep>, fallback: RunStep) -> Self {
        Self {
            setup_exit: ExitResult::Code(0),
            plan: Mutex::new(plan.into()),
            fallback,
            commands: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            stop_after: None,
            runs: AtomicU32::new(0),
        }
    }

    pub fn with_setup_exit(mut self, exit: ExitResult) -> Self {
        self.setup_exit = exit;
        self
    }

    /// Raise `flag` once `runs` run invocations have finished.
    pub fn stop_after(mut self, runs: u32, flag: Arc<AtomicBool>) -> Self {
        self.stop_after = Some((runs, flag));
        self
    }

    pub fn run_count(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn setup_count(&self) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, SinkCommand::Setup { .. }))
            .count()
    }
}

#[async_trait]
impl SinkProcess for ScriptedProcess {
    async fn execute(&self, command: &SinkCommand, token: &ApiToken) -> DomainResult<ExitResult> {
        self.commands.lock().unwrap().push(command.clone());
        self.tokens.lock().unwrap().push(token.expose().to_string());

        if let SinkCommand::Setup { .. } = command {
            return Ok(self.setup_exit);
        }

        let step = self.plan.lock().unwrap().pop_front().unwrap_or_else(|| self.fallback.clone());
        tokio::time::sleep(step.duration).await;

        let finished = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, flag)) = &self.stop_after {
            if finished >= *limit {
                flag.store(true, Ordering::SeqCst);
            }
        }

        step.outcome.map_err(DomainError::ProcessFailed)
    }
}
