//! Outcome of a supervised child process.

use serde::Serialize;
use std::fmt;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExitResult {
    /// Exited on its own with a status code.
    Code(i32),
    /// Terminated by a signal, usually our forced kill.
    Killed(Option<i32>),
}

impl ExitResult {
    pub fn success(&self) -> bool {
        matches!(self, Self::Code(0))
    }

    #[cfg(unix)]
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        match status.code() {
            Some(code) => Self::Code(code),
            None => Self::Killed(status.signal()),
        }
    }
}

impl fmt::Display for ExitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {code}"),
            Self::Killed(Some(signal)) => write!(f, "killed by signal {signal}"),
            Self::Killed(None) => write!(f, "killed"),
        }
    }
}
