//! sink-supervisor CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sink_supervisor::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // `serve` installs the configured subscriber itself
    if !matches!(cli.command, Commands::Serve(_)) {
        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Serve(args) => commands::serve::execute(args, config, cli.json).await,
        Commands::Ready(args) => commands::ready::execute(args, config, cli.json).await,
        Commands::Schema(args) => commands::schema::execute(args, config, cli.json).await,
    };

    if let Err(err) = result {
        sink_supervisor::cli::handle_error(err, cli.json);
    }
}
