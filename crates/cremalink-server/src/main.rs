//! Cremalink server
//!
//! Runs the Cremalink integration on the embedded host with the simulated
//! device backend. Usage: `cremalink [CONFIG_DIR]` (default `./config`).

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use cremalink_device::SimulatedFactory;
use cremalink_ha::CremalinkIntegration;
use ha_helpers::{HomeAssistant, HostConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config"));
    info!("Starting Cremalink server with config dir {}", config_dir.display());

    let config = ServerConfig::load(&config_dir)?;
    let hass = HomeAssistant::new(HostConfig::new(&config_dir))?;
    CremalinkIntegration::register(&hass, Arc::new(SimulatedFactory::new()));
    hass.async_start().await;

    for definition in config.cremalink_ha {
        let title = definition.title.clone();
        match hass.config_entries.add(definition.into_config_entry()) {
            Ok(entry) => {
                if let Err(e) = hass.config_entries.setup(&entry.entry_id).await {
                    warn!("Setup of {} did not complete: {}", title, e);
                }
            }
            Err(e) => warn!("Skipping {}: {}", title, e),
        }
    }

    info!(
        "Cremalink server running with {} entities",
        hass.entities.entity_count()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    hass.async_stop().await;

    Ok(())
}
