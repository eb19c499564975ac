//! `SinkProcess` backed by the real sink binary.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

use super::executor::ProcessExecutor;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ApiToken, ExitResult, SinkCommand, SinkConfig, API_TOKEN_ENV};
use crate::domain::ports::SinkProcess;

/// Invokes the sink binary through the executor, one call per subcommand.
#[derive(Debug, Clone)]
pub struct BinarySinkProcess {
    executor: ProcessExecutor,
    binary: PathBuf,
    working_dir: PathBuf,
    run_timeout: Option<Duration>,
}

impl BinarySinkProcess {
    pub fn new(executor: ProcessExecutor, binary: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            binary: binary.into(),
            working_dir: working_dir.into(),
            run_timeout: None,
        }
    }

    pub fn from_config(config: &SinkConfig) -> Self {
        Self::new(
            ProcessExecutor::new(&config.log_file),
            &config.binary_path,
            &config.working_dir,
        )
        .with_run_timeout(config.run_timeout())
    }

    /// Limit applied to `run` invocations. `setup` is never timed out.
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    fn timeout_for(&self, command: &SinkCommand) -> Option<Duration> {
        match command {
            SinkCommand::Run { .. } => self.run_timeout,
            SinkCommand::Setup { .. } => None,
        }
    }
}

#[async_trait]
impl SinkProcess for BinarySinkProcess {
    #[instrument(skip(self, token), fields(subcommand = command.name()))]
    async fn execute(&self, command: &SinkCommand, token: &ApiToken) -> DomainResult<ExitResult> {
        let env = [(API_TOKEN_ENV.to_string(), token.expose().to_string())];
        let process = self
            .executor
            .execute(&self.binary, &command.to_args(), &env, &self.working_dir)
            .await
            .map_err(|e| DomainError::ProcessFailed(e.to_string()))?;

        let exit = process
            .wait_with_timeout(self.timeout_for(command))
            .await
            .map_err(|e| DomainError::ProcessFailed(e.to_string()))?;

        info!(pid = ?process.pid(), %exit, "sink {} finished", command.name());
        Ok(exit)
    }
}
