//! Subprocess launcher with a settle-once completion and a timeout/kill path.
//!
//! The child's stdout and stderr are both attached to the run log file, which
//! the caller truncates before the first launch.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::domain::models::ExitResult;
use crate::infrastructure::logging::secret_scrubbing::scrub_args;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Failed to spawn {command}: {reason}")]
    Spawn { command: String, reason: String },

    #[error("Failed to open process log {path}: {reason}")]
    LogFile { path: String, reason: String },

    #[error("Process did not finish: {command} (pid {pid:?}) exceeded {timeout:?}")]
    DidNotFinish {
        command: String,
        pid: Option<u32>,
        timeout: Duration,
    },

    #[error("Error trying to kill child process {pid:?}: {reason}")]
    KillFailed { pid: Option<u32>, reason: String },

    #[error("Failed waiting for child process: {0}")]
    Wait(String),
}

pub type ProcessOutcome = Result<ExitResult, ProcessError>;

/// Completion of a launched process. Settles exactly once; later attempts are ignored.
#[derive(Clone)]
pub struct Completion {
    tx: Arc<watch::Sender<Option<ProcessOutcome>>>,
    rx: watch::Receiver<Option<ProcessOutcome>>,
}

impl Completion {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self { tx: Arc::new(tx), rx }
    }

    /// Settle with `outcome`. Returns false if it was already settled.
    pub fn settle(&self, outcome: ProcessOutcome) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }

    pub fn is_pending(&self) -> bool {
        self.rx.borrow().is_none()
    }

    /// The settled outcome, if any.
    pub fn peek(&self) -> Option<ProcessOutcome> {
        self.rx.borrow().clone()
    }

    pub async fn wait(&self) -> ProcessOutcome {
        let mut rx = self.rx.clone();
        let settled = match rx.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| Err(ProcessError::Wait("completion dropped".to_string())))
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

/// What the timeout branch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutAction {
    /// The process had already settled; nothing was done.
    AlreadySettled,
    /// Completion rejected and the kill signal delivered.
    Killed,
    /// Completion rejected but the kill failed; the child may be orphaned.
    KillFailed(ProcessError),
}

/// Handle to a launched process.
pub struct RunningProcess {
    command: String,
    pid: Option<u32>,
    completion: Completion,
    kill_tx: mpsc::Sender<oneshot::Sender<Result<(), String>>>,
}

impl RunningProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn is_pending(&self) -> bool {
        self.completion.is_pending()
    }

    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    pub async fn wait(&self) -> ProcessOutcome {
        self.completion.wait().await
    }

    /// Wait for the process, enforcing `timeout` when given.
    pub async fn wait_with_timeout(&self, timeout: Option<Duration>) -> ProcessOutcome {
        let Some(limit) = timeout else {
            return self.wait().await;
        };

        match tokio::time::timeout(limit, self.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.on_timeout(limit).await;
                self.wait().await
            }
        }
    }

    /// Timeout branch: reject the completion if still pending, then force a kill.
    pub async fn on_timeout(&self, limit: Duration) -> TimeoutAction {
        if !self.completion.is_pending() {
            return TimeoutAction::AlreadySettled;
        }

        warn!(pid = ?self.pid, command = %self.command, timeout_ms = limit.as_millis() as u64, "Process did not finish");
        let rejected = self.completion.settle(Err(ProcessError::DidNotFinish {
            command: self.command.clone(),
            pid: self.pid,
            timeout: limit,
        }));
        if !rejected {
            // exited between the check and the settle
            return TimeoutAction::AlreadySettled;
        }

        match self.kill().await {
            Ok(()) => TimeoutAction::Killed,
            Err(e) => {
                error!(pid = ?self.pid, command = %self.command, error = %e, "Error trying to kill child process");
                TimeoutAction::KillFailed(e)
            }
        }
    }

    /// Send SIGKILL to the child. Does not touch the completion.
    pub async fn kill(&self) -> Result<(), ProcessError> {
        let failed = |reason: String| ProcessError::KillFailed {
            pid: self.pid,
            reason,
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.kill_tx
            .send(reply_tx)
            .await
            .map_err(|_| failed("process already reaped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| failed("process already reaped".to_string()))?
            .map_err(failed)
    }
}

/// Launches external commands with their output captured in a log file.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    log_file: PathBuf,
}

impl ProcessExecutor {
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
        }
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Launch `command` and return with a handle to its completion once it is spawned.
    ///
    /// The child inherits the parent environment plus `env`.
    pub async fn execute(
        &self,
        command: impl AsRef<Path>,
        args: &[String],
        env: &[(String, String)],
        cwd: impl AsRef<Path>,
    ) -> Result<RunningProcess, ProcessError> {
        let command_name = command.as_ref().display().to_string();
        let (stdout, stderr) = self.open_log().await?;

        let mut cmd = Command::new(command.as_ref());
        cmd.args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(cwd.as_ref())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| ProcessError::Spawn {
            command: command_name.clone(),
            reason: e.to_string(),
        })?;
        let pid = child.id();

        info!(pid = ?pid, command = %command_name, args = %scrub_args(args), "spawned child process");

        let completion = Completion::new();
        let (kill_tx, kill_rx) = mpsc::channel(1);
        tokio::spawn(reap(child, completion.clone(), kill_rx, command_name.clone()));

        Ok(RunningProcess {
            command: command_name,
            pid,
            completion,
            kill_tx,
        })
    }

    async fn open_log(&self) -> Result<(Stdio, Stdio), ProcessError> {
        let log_error = |e: std::io::Error| ProcessError::LogFile {
            path: self.log_file.display().to_string(),
            reason: e.to_string(),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .await
            .map_err(log_error)?;
        let err_file = file.try_clone().await.map_err(log_error)?;
        Ok((
            Stdio::from(file.into_std().await),
            Stdio::from(err_file.into_std().await),
        ))
    }
}

/// Owns the child until it exits, serving kill requests meanwhile.
async fn reap(
    mut child: Child,
    completion: Completion,
    mut kill_rx: mpsc::Receiver<oneshot::Sender<Result<(), String>>>,
    command: String,
) {
    loop {
        let request = tokio::select! {
            status = child.wait() => {
                settle_exit(&completion, status, &command);
                return;
            }
            request = kill_rx.recv() => request,
        };

        match request {
            Some(reply) => {
                let result = child.start_kill().map_err(|e| e.to_string());
                let _ = reply.send(result);
            }
            None => {
                // handle dropped, nobody can kill anymore
                let status = child.wait().await;
                settle_exit(&completion, status, &command);
                return;
            }
        }
    }
}

fn settle_exit(completion: &Completion, status: std::io::Result<std::process::ExitStatus>, command: &str) {
    let outcome = status
        .map(ExitResult::from_status)
        .map_err(|e| ProcessError::Wait(e.to_string()));

    match &outcome {
        Ok(exit) => info!(command, %exit, "child process exited"),
        Err(e) => error!(command, error = %e, "failed waiting for child process"),
    }

    if !completion.settle(outcome) {
        debug!(command, "exit observed after completion was already settled");
    }
}
