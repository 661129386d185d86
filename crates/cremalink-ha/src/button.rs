//! Button platform: one button per device command

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ha_core::Platform;
use ha_helpers::{async_add_executor_job, Entity, EntityAction, EntityError, EntityInfo};
use tokio::sync::watch;
use tracing::debug;

use crate::constants::{CMD_STOP, POWER_COMMANDS};
use crate::entry::CremalinkEntry;
use crate::naming::beverage_display;

pub struct CommandButton {
    info: EntityInfo,
    entry: Arc<CremalinkEntry>,
    command: String,
    is_stop: bool,
}

impl CommandButton {
    pub fn new(entry: &Arc<CremalinkEntry>, command: &str) -> Self {
        let is_stop = command.eq_ignore_ascii_case(CMD_STOP);
        let (display, icon) = beverage_display(command);
        let (name, icon) = if is_stop {
            ("Stop".to_string(), "mdi:stop")
        } else {
            (format!("Brew {display}"), icon)
        };

        Self {
            info: EntityInfo::new(
                entry.unique_id(&format!("cmd_{command}")),
                Platform::Button,
                name,
            )
            .with_icon(icon)
            .with_device(entry.device_info()),
            entry: Arc::clone(entry),
            command: command.to_string(),
            is_stop,
        }
    }
}

#[async_trait]
impl Entity for CommandButton {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    /// Stop is only offered while the machine is busy, everything else
    /// only while it is idle
    fn available(&self) -> bool {
        let coordinator = &self.entry.coordinator;
        if !coordinator.last_update_success() {
            return false;
        }
        match coordinator.data() {
            Some(snapshot) => snapshot.is_busy == self.is_stop,
            None => false,
        }
    }

    fn state(&self) -> Option<String> {
        None
    }

    /// Recipe parameters and profile of the beverage this button brews
    fn extra_state_attributes(&self) -> HashMap<String, serde_json::Value> {
        let mut attributes = HashMap::new();
        let Some(props) = self.entry.properties.as_ref().and_then(|c| c.data()) else {
            return attributes;
        };
        if let Some(recipe) = props.recipe_for(&self.command) {
            for (param, value) in &recipe.params {
                attributes.insert(param.clone(), serde_json::Value::from(*value));
            }
            attributes.insert("profile".to_string(), serde_json::Value::from(recipe.profile));
        }
        attributes
    }

    fn update_signals(&self) -> Vec<watch::Receiver<u64>> {
        let mut signals = vec![self.entry.coordinator.subscribe()];
        if let Some(properties) = &self.entry.properties {
            signals.push(properties.subscribe());
        }
        signals
    }

    async fn async_handle_action(&self, action: EntityAction) -> Result<(), EntityError> {
        if action != EntityAction::Press {
            return Err(EntityError::NotSupported {
                entity_id: self.info.unique_id.clone(),
                action: action.service_name().to_string(),
            });
        }

        let profile = self.entry.command_profile();
        debug!("Pressing {} (profile {:?})", self.command, profile);

        let device = Arc::clone(&self.entry.device);
        let command = self.command.clone();
        async_add_executor_job(move || device.execute(&command, profile))
            .await
            .map_err(|e| EntityError::Device(e.to_string()))?
            .map_err(|e| EntityError::Device(e.to_string()))?;

        self.entry.coordinator.async_request_refresh().await;
        Ok(())
    }
}

/// Buttons for every command except the power commands
pub fn build_entities(entry: &Arc<CremalinkEntry>) -> Vec<Arc<dyn Entity>> {
    entry
        .commands
        .iter()
        .filter(|cmd| !POWER_COMMANDS.iter().any(|p| cmd.eq_ignore_ascii_case(p)))
        .map(|cmd| Arc::new(CommandButton::new(entry, cmd)) as Arc<dyn Entity>)
        .collect()
}
