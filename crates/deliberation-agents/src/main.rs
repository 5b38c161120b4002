use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use deliberation::{DeliberationService, GeminiGateway};
use deliberation_agents::cli::Args;
use deliberation_agents::{commands, AgentsConfig, JsonFileStore};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON result only.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = AgentsConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.store_dir {
        config.store_dir = dir;
    }
    if config.endpoint.api_key.is_empty() {
        tracing::warn!("No API key configured (set DELIBERATION_API_KEY or GEMINI_API_KEY)");
    }
    let store = Arc::new(JsonFileStore::open(&config.store_dir).with_context(|| {
        format!("Failed to open session store {}", config.store_dir.display())
    })?);
    info!(
        model = %config.endpoint.model,
        store = %store.dir().display(),
        "Deliberation host starting"
    );
    let gateway = GeminiGateway::new(config.gemini()).context("Failed to build model client")?;
    let service = DeliberationService::with_config(gateway, store, config.service());

    let output = commands::execute(&service, args.command, config.max_rounds).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
