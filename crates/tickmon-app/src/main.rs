//! Tickmon - dashboard background tracking service - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Dashboard background tracking service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TICKMON_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tickmon_telemetry::init_logging()?;

    info!("Starting tickmon v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path: CLI arg > TICKMON_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("TICKMON_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = if std::path::Path::new(&config_path).exists() {
        tickmon_app::AppConfig::from_file(&config_path)?
    } else {
        tracing::warn!(path = %config_path, "Config file not found, using defaults");
        tickmon_app::AppConfig::default()
    };
    info!(base_url = %config.api.base_url, "Configuration loaded");

    let app = tickmon_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
