use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use marquee::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "marquee",
    version,
    about = "Digital-signage player orchestration core",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the player against the configured CMS
    Run,

    /// Predict upcoming playback from the cached schedule
    Timeline {
        /// Horizon in hours
        #[arg(long, default_value = "4")]
        hours: u32,

        /// Emit JSON instead of a table
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show the cached snapshots and display identity
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_format == "json" || config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    match cli.command {
        Commands::Run => commands::run(config, reload_handle).await,
        Commands::Timeline { hours, json } => commands::timeline(config, hours, json).await,
        Commands::Status => commands::status(config).await,
    }
}
