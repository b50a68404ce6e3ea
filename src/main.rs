use anyhow::Result;
use clap::Parser;
use click_aggregator::config::{CliArgs, Config};
use click_aggregator::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let args = CliArgs::parse();
    let config = args
        .apply(Config::from_env()?)
        .validated()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("click_aggregator={},tower_http=debug", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting click aggregator");
    tracing::info!(
        "Configuration: bind_address={}, store={}, limit={} per {}s",
        config.bind_address(),
        config.store_backend,
        config.rate_limit_max_requests,
        config.rate_limit_window_secs
    );

    let server = Server::connect(config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start server: {}", e))?;

    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
