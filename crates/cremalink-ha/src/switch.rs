//! Switch platform: machine power

use std::sync::Arc;

use async_trait::async_trait;
use ha_core::{Platform, STATE_OFF, STATE_ON};
use ha_helpers::{async_add_executor_job, Entity, EntityAction, EntityError, EntityInfo};
use tokio::sync::watch;
use tracing::debug;

use crate::constants::{CMD_STANDBY, CMD_WAKEUP};
use crate::entry::CremalinkEntry;

/// On whenever the machine is out of standby
pub struct PowerSwitch {
    info: EntityInfo,
    entry: Arc<CremalinkEntry>,
}

impl PowerSwitch {
    pub fn new(entry: &Arc<CremalinkEntry>) -> Self {
        Self {
            info: EntityInfo::new(
                entry.unique_id("power"),
                Platform::Switch,
                format!("{} Power", entry.title),
            )
            .with_icon("mdi:power")
            .with_device(entry.device_info()),
            entry: Arc::clone(entry),
        }
    }

    async fn run(&self, command: &'static str) -> Result<(), EntityError> {
        debug!("Sending {} to {}", command, self.entry.title);
        let device = Arc::clone(&self.entry.device);
        async_add_executor_job(move || device.execute(command, None))
            .await
            .map_err(|e| EntityError::Device(e.to_string()))?
            .map_err(|e| EntityError::Device(e.to_string()))?;

        self.entry.coordinator.async_request_refresh().await;
        Ok(())
    }
}

#[async_trait]
impl Entity for PowerSwitch {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn available(&self) -> bool {
        let coordinator = &self.entry.coordinator;
        coordinator.last_update_success() && coordinator.data().is_some()
    }

    fn state(&self) -> Option<String> {
        self.entry
            .coordinator
            .data()
            .map(|s| if s.is_standby() { STATE_OFF } else { STATE_ON }.to_string())
    }

    fn update_signals(&self) -> Vec<watch::Receiver<u64>> {
        vec![self.entry.coordinator.subscribe()]
    }

    async fn async_handle_action(&self, action: EntityAction) -> Result<(), EntityError> {
        match action {
            EntityAction::TurnOn => self.run(CMD_WAKEUP).await,
            EntityAction::TurnOff => self.run(CMD_STANDBY).await,
            other => Err(EntityError::NotSupported {
                entity_id: self.info.unique_id.clone(),
                action: other.service_name().to_string(),
            }),
        }
    }
}

/// The power switch, for machines whose map has both power commands
pub fn build_entities(entry: &Arc<CremalinkEntry>) -> Vec<Arc<dyn Entity>> {
    if entry.has_command(CMD_WAKEUP) && entry.has_command(CMD_STANDBY) {
        vec![Arc::new(PowerSwitch::new(entry))]
    } else {
        Vec::new()
    }
}
