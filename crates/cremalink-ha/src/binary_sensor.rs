//! Binary sensor platform

use std::sync::Arc;

use async_trait::async_trait;
use ha_core::{Platform, STATE_OFF, STATE_ON};
use ha_helpers::{Entity, EntityInfo};
use tokio::sync::watch;

use crate::coordinator::StatusCoordinator;
use crate::entry::CremalinkEntry;

/// On while the machine reports itself busy
pub struct BusySensor {
    info: EntityInfo,
    coordinator: Arc<StatusCoordinator>,
}

impl BusySensor {
    pub fn new(entry: &CremalinkEntry) -> Self {
        Self {
            info: EntityInfo::new(
                entry.unique_id("busy"),
                Platform::BinarySensor,
                format!("{} Busy", entry.title),
            )
            .with_icon("mdi:coffee-to-go")
            .with_device(entry.device_info()),
            coordinator: Arc::clone(&entry.coordinator),
        }
    }
}

#[async_trait]
impl Entity for BusySensor {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn available(&self) -> bool {
        self.coordinator.data().is_some()
    }

    fn state(&self) -> Option<String> {
        self.coordinator
            .data()
            .map(|s| if s.is_busy { STATE_ON } else { STATE_OFF }.to_string())
    }

    fn update_signals(&self) -> Vec<watch::Receiver<u64>> {
        vec![self.coordinator.subscribe()]
    }
}

pub fn build_entities(entry: &Arc<CremalinkEntry>) -> Vec<Arc<dyn Entity>> {
    vec![Arc::new(BusySensor::new(entry))]
}
