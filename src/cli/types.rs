use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::{ready::ReadyArgs, schema::SchemaArgs, serve::ServeArgs};

#[derive(Parser)]
#[command(name = "sink-supervisor")]
#[command(about = "Keeps a substreams Postgres sink running and serves its data", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to sink.yaml)
    #[arg(short, long, global = true, env = "SINK_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the sink job and the read API until interrupted
    Serve(ServeArgs),

    /// Probe sink readiness once; exits non-zero when not ready
    Ready(ReadyArgs),

    /// Inspect or advance the schema namespace of the configured network
    Schema(SchemaArgs),
}
