//! Entity model
//!
//! An entity is a read-through view: it computes its state from whatever
//! it is bound to (usually a coordinator snapshot) each time the entity
//! manager asks. Entities never write states themselves.

use std::collections::HashMap;

use async_trait::async_trait;
use ha_core::{DeviceInfo, EntityCategory, Platform, SensorStateClass, State};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("{entity_id} does not support {action}")]
    NotSupported { entity_id: String, action: String },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("invalid entity name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("device error: {0}")]
    Device(String),
}

/// Static description of an entity, fixed when the entity is created
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub unique_id: String,
    pub platform: Platform,
    /// Full display name, also the source of the generated entity ID
    pub name: String,
    pub icon: Option<String>,
    pub unit_of_measurement: Option<String>,
    pub state_class: Option<SensorStateClass>,
    pub entity_category: Option<EntityCategory>,
    pub device_info: Option<DeviceInfo>,
    /// Hand the last persisted state to the entity when it is added
    pub restore_state: bool,
}

impl EntityInfo {
    pub fn new(unique_id: impl Into<String>, platform: Platform, name: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            platform,
            name: name.into(),
            icon: None,
            unit_of_measurement: None,
            state_class: None,
            entity_category: None,
            device_info: None,
            restore_state: false,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measurement = Some(unit.into());
        self
    }

    pub fn with_state_class(mut self, state_class: SensorStateClass) -> Self {
        self.state_class = Some(state_class);
        self
    }

    pub fn with_category(mut self, category: EntityCategory) -> Self {
        self.entity_category = Some(category);
        self
    }

    pub fn with_device(mut self, device_info: DeviceInfo) -> Self {
        self.device_info = Some(device_info);
        self
    }

    pub fn with_restore_state(mut self) -> Self {
        self.restore_state = true;
        self
    }
}

/// User-triggered action routed to an entity through a platform service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityAction {
    Press,
    TurnOn,
    TurnOff,
    SelectOption(String),
}

impl EntityAction {
    pub fn service_name(&self) -> &'static str {
        match self {
            EntityAction::Press => "press",
            EntityAction::TurnOn => "turn_on",
            EntityAction::TurnOff => "turn_off",
            EntityAction::SelectOption(_) => "select_option",
        }
    }
}

#[async_trait]
pub trait Entity: Send + Sync + 'static {
    fn info(&self) -> &EntityInfo;

    fn available(&self) -> bool {
        true
    }

    /// Current state value, `None` for unknown
    fn state(&self) -> Option<String>;

    fn extra_state_attributes(&self) -> HashMap<String, serde_json::Value> {
        HashMap::new()
    }

    /// Attributes describing what the entity accepts, such as select options
    fn capability_attributes(&self) -> HashMap<String, serde_json::Value> {
        HashMap::new()
    }

    /// Notifications after which the state must be rewritten
    fn update_signals(&self) -> Vec<watch::Receiver<u64>> {
        Vec::new()
    }

    /// Called once before the first state write
    async fn async_added_to_hass(&self, _last_state: Option<State>) {}

    async fn async_handle_action(&self, action: EntityAction) -> Result<(), EntityError> {
        Err(EntityError::NotSupported {
            entity_id: self.info().unique_id.clone(),
            action: action.service_name().to_string(),
        })
    }
}
