//! Pinpoint CLI entry point.

use anyhow::Result;
use clap::Parser;
use pinpoint::cli::{commands, Cli, Commands};
use pinpoint::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging; -v flags override the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("pinpoint={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    let tenant = cli.tenant.as_str();

    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Ingest { file, name } => {
            commands::run_ingest(tenant, file, name.as_deref(), settings).await?;
        }

        Commands::Ask { question } => {
            commands::run_ask(tenant, question, settings).await?;
        }

        Commands::Search { query, video, limit } => {
            commands::run_search(tenant, query, video.as_deref(), *limit, settings).await?;
        }

        Commands::Jobs { action } => {
            commands::run_jobs(tenant, action, settings).await?;
        }

        Commands::Notifications => {
            commands::run_notifications(tenant, settings).await?;
        }

        Commands::Videos { action } => {
            commands::run_videos(tenant, action, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}
