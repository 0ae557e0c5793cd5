use ledger_intake::{api::start_server, AppConfig, Assistant};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    let config = AppConfig::from_env()?;

    info!("Ledger Intake - API Server");
    info!("Port: {}", config.port);

    let assistant = Arc::new(Assistant::from_config(&config)?);

    info!("Assistant initialized");

    start_server(assistant, config.port).await?;

    Ok(())
}
