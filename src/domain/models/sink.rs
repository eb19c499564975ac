//! Sink invocation models: credentials, command lines, lifecycle phases and
//! the restart budget of a supervised run loop.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Environment variable the sink binary reads its API token from.
pub const API_TOKEN_ENV: &str = "SUBSTREAMS_API_TOKEN";

/// Output module the sink consumes.
pub const SINK_OUTPUT_MODULE: &str = "db_out";

/// Substreams API token. Never rendered in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken([REDACTED])")
    }
}

/// Arguments of one sink binary invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCommand {
    /// `setup <dsn> <schema-file>`
    Setup { dsn: String, schema_file: String },
    /// `run <dsn> <endpoint> <package> db_out [--development-mode]`
    Run {
        dsn: String,
        endpoint: String,
        release_uri: String,
        development_mode: bool,
    },
}

impl SinkCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup { .. } => "setup",
            Self::Run { .. } => "run",
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::Setup { dsn, schema_file } => {
                vec!["setup".to_string(), dsn.clone(), schema_file.clone()]
            }
            Self::Run {
                dsn,
                endpoint,
                release_uri,
                development_mode,
            } => {
                let mut args = vec![
                    "run".to_string(),
                    dsn.clone(),
                    endpoint.clone(),
                    release_uri.clone(),
                    SINK_OUTPUT_MODULE.to_string(),
                ];
                if *development_mode {
                    args.push("--development-mode".to_string());
                }
                args
            }
        }
    }
}

/// Lifecycle phase of one supervised sink job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorPhase {
    Idle,
    Provisioning,
    Downloading,
    SettingUp,
    Running,
    Completed,
    Crashed,
    Restarting,
    Stopped,
}

impl SupervisorPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Provisioning => "provisioning",
            Self::Downloading => "downloading",
            Self::SettingUp => "setting_up",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Crashed => "crashed",
            Self::Restarting => "restarting",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SupervisorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restart budget of a run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Fast exits tolerated before the loop gives up.
    pub max_restarts: u32,
    /// A run lasting at least this long is healthy and clears the counter.
    pub reset_after: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            reset_after: Duration::from_secs(60),
        }
    }
}

/// Counts consecutive fast exits of a run loop.
///
/// A loop driven by this tracker that always crashes quickly makes exactly
/// `max_restarts + 1` attempts.
#[derive(Debug, Clone)]
pub struct RestartTracker {
    policy: RestartPolicy,
    runs: u32,
}

impl RestartTracker {
    pub fn new(policy: RestartPolicy) -> Self {
        Self { policy, runs: 0 }
    }

    /// Whether another attempt fits in the budget.
    pub fn can_start(&self) -> bool {
        self.runs <= self.policy.max_restarts
    }

    /// Record the start of an attempt and return its number within the current streak.
    pub fn begin(&mut self) -> u32 {
        self.runs += 1;
        self.runs
    }

    /// Record the end of an attempt. Returns true when the counter was reset.
    pub fn finish(&mut self, elapsed: Duration) -> bool {
        if elapsed >= self.policy.reset_after {
            self.runs = 0;
            true
        } else {
            false
        }
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }
}

/// Readiness of the sink as reported by its head block drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Readiness {
    pub ready: bool,
    /// Seconds behind the chain head, 0 when unknown
    pub delay: f64,
}

impl Readiness {
    pub fn from_drift(drift: Option<f64>, threshold: f64) -> Self {
        match drift {
            Some(delay) => Self {
                ready: delay < threshold,
                delay,
            },
            None => Self::unknown(),
        }
    }

    pub fn unknown() -> Self {
        Self {
            ready: false,
            delay: 0.0,
        }
    }
}
