//! Implementation of the `sink-supervisor ready` command.

use anyhow::Result;
use clap::Args;
use std::path::Path;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Readiness;
use crate::domain::ports::ReadinessCheck;
use crate::infrastructure::config::ConfigLoader;
use crate::services::MetricsReadinessProbe;

#[derive(Args, Debug)]
pub struct ReadyArgs {
    /// Metrics endpoint to scrape instead of the configured one
    #[arg(long)]
    pub metrics_url: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct ReadyOutput {
    pub ready: bool,
    pub delay: f64,
}

impl From<Readiness> for ReadyOutput {
    fn from(readiness: Readiness) -> Self {
        Self {
            ready: readiness.ready,
            delay: readiness.delay,
        }
    }
}

impl CommandOutput for ReadyOutput {
    fn to_human(&self) -> String {
        if self.ready {
            format!("ready ({:.1}s behind head)", self.delay)
        } else if self.delay > 0.0 {
            format!("not ready ({:.1}s behind head)", self.delay)
        } else {
            "not ready (drift unknown)".to_string()
        }
    }
}

pub async fn execute(args: ReadyArgs, config_path: Option<&Path>, json_mode: bool) -> Result<()> {
    let config = ConfigLoader::extract(config_path)?;
    let metrics_url = args.metrics_url.unwrap_or(config.sink.metrics_url);
    let probe = MetricsReadinessProbe::new(metrics_url, config.sink.readiness_threshold_secs);

    let result = ReadyOutput::from(probe.check().await);
    output(&result, json_mode);
    if !result.ready {
        std::process::exit(1);
    }
    Ok(())
}
