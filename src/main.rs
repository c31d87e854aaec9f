//! # dm-gateway
//!
//! Entry point: tracing, configuration, then the HTTP and socket server.

use anyhow::Result;
use tracing::info;

use dm_gateway::config::Settings;
use dm_gateway::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    dm_gateway::telemetry::init_tracing();

    let settings = Settings::load()?;
    info!(
        addr = %settings.server_addr(),
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;
    application.run_until_stopped().await?;

    Ok(())
}
