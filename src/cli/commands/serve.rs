//! Implementation of the `sink-supervisor serve` command.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::http::{AppState, HttpServer};
use crate::adapters::postgres::{initialize_from_config, PgCatalogRepository, PgSchemaRegistry};
use crate::cli::output::{output, CommandOutput};
use crate::domain::ports::SchemaRegistry;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};
use crate::infrastructure::process::BinarySinkProcess;
use crate::infrastructure::release::ReleaseBinaryProvisioner;
use crate::services::{sink_job_factory, JobLifecycleManager, MetricsReadinessProbe, SinkSupervisor};

const JOB_MANAGER_NAME: &str = "SynchronizationJobManager";

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Serve the read API without starting the sink job
    #[arg(long)]
    pub no_job: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct ServeOutput {
    pub success: bool,
    pub stopped_jobs: Vec<String>,
}

impl CommandOutput for ServeOutput {
    fn to_human(&self) -> String {
        if self.stopped_jobs.is_empty() {
            "Shut down".to_string()
        } else {
            format!("Shut down, stopped jobs: {}", self.stopped_jobs.join(", "))
        }
    }
}

pub async fn execute(args: ServeArgs, config_path: Option<&Path>, json_mode: bool) -> Result<()> {
    let config = Arc::new(ConfigLoader::load(config_path)?);
    let log_config = LogConfig::try_from(&config.logging).map_err(|e| anyhow!(e))?;
    let _logger = LoggerImpl::init(&log_config)?;

    let pool = initialize_from_config(&config.database)
        .await
        .context("Failed to initialize database")?;

    let registry: Arc<dyn SchemaRegistry> =
        Arc::new(PgSchemaRegistry::new(pool.clone(), &config.sink.schema_prefix));
    let provisioner = Arc::new(ReleaseBinaryProvisioner::from_config(&config)?);
    let process = Arc::new(BinarySinkProcess::from_config(&config.sink));
    let supervisor = Arc::new(SinkSupervisor::new(
        config.clone(),
        registry.clone(),
        provisioner,
        process,
    ));

    let manager = JobLifecycleManager::new(JOB_MANAGER_NAME, sink_job_factory(supervisor));
    if args.no_job {
        warn!("sink job disabled, serving the read API only");
    } else {
        manager.set_desired_jobs(&HashSet::from([config.sink.job_name.clone()]));
        info!(job = %config.sink.job_name, "Starting sink job");
    }

    let state = AppState {
        catalog: Arc::new(PgCatalogRepository::new(pool, registry, &config.network)),
        readiness: Arc::new(MetricsReadinessProbe::from_config(&config.sink)),
    };
    HttpServer::new(config.server.clone(), state)
        .serve_with_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("HTTP server failed: {e}"))?;

    let mut stopped_jobs: Vec<String> = manager.running_jobs().into_iter().collect();
    stopped_jobs.sort();
    manager.stop().await;

    output(
        &ServeOutput {
            success: true,
            stopped_jobs,
        },
        json_mode,
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
