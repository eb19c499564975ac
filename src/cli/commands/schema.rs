//! Implementation of the `sink-supervisor schema` commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use std::path::Path;

use crate::adapters::postgres::{initialize_from_config, PgSchemaRegistry};
use crate::cli::output::{output, CommandOutput};
use crate::domain::ports::SchemaRegistry;
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaCommands,
}

#[derive(Subcommand, Debug)]
pub enum SchemaCommands {
    /// Show the active namespace of the configured network
    Current,

    /// Create the next namespace and make it active
    Allocate {
        /// Only print the name the allocation would produce
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct SchemaOutput {
    pub network: String,
    pub schema: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub allocated: bool,
    pub dry_run: bool,
}

impl CommandOutput for SchemaOutput {
    fn to_human(&self) -> String {
        match (&self.schema, self.dry_run, self.allocated) {
            (None, _, _) => format!("No schema provisioned for {}", self.network),
            (Some(schema), true, _) => format!("Next schema for {}: {schema} (dry run)", self.network),
            (Some(schema), false, true) => format!("Allocated schema {schema} for {}", self.network),
            (Some(schema), false, false) => match self.created_at {
                Some(at) => format!("Active schema for {}: {schema} (since {})", self.network, at.to_rfc3339()),
                None => format!("Active schema for {}: {schema}", self.network),
            },
        }
    }
}

pub async fn execute(args: SchemaArgs, config_path: Option<&Path>, json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load(config_path)?;
    let pool = initialize_from_config(&config.database)
        .await
        .context("Failed to initialize database")?;
    let registry = PgSchemaRegistry::new(pool, &config.sink.schema_prefix);
    let network = config.network.clone();

    let result = match args.command {
        SchemaCommands::Current => {
            let current = registry.current_schema(&network).await?;
            SchemaOutput {
                network,
                created_at: current.as_ref().map(|s| s.created_at),
                schema: current.map(|s| s.schema_name),
                allocated: false,
                dry_run: false,
            }
        }
        SchemaCommands::Allocate { dry_run: true } => SchemaOutput {
            schema: Some(registry.peek_next_schema(&network).await?),
            network,
            created_at: None,
            allocated: false,
            dry_run: true,
        },
        SchemaCommands::Allocate { dry_run: false } => SchemaOutput {
            schema: Some(registry.allocate_next_schema(&network).await?),
            network,
            created_at: Some(Utc::now()),
            allocated: true,
            dry_run: false,
        },
    };

    output(&result, json_mode);
    Ok(())
}
