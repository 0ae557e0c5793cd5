//! One-shot reconciliation: replays mirror sync for every stored record and
//! prints the outcome as JSON.

use ledger_intake::{AppConfig, Assistant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let assistant = Assistant::from_config(&config)?;

    info!("Starting resync");
    let outcome = assistant.reconciler.resync_all().await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
