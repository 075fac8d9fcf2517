use anyhow::Context;
use shortener_core::ShortenerCore;
use shortener_core::config::{Config, load_from_env};
use shortener_core::infrastructure::persistence;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = load_from_env().context("Failed to load configuration")?;
    init_tracing(&config);
    config.print_summary();

    let storage = persistence::connect(&config)
        .await
        .context("Failed to open storage")?;
    let core = ShortenerCore::new(storage, &config);

    core.ping().await.context("Storage is not reachable")?;
    tracing::info!(capabilities = ?core.capabilities(), "Shortener core ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    core.shutdown().await;
    Ok(())
}
