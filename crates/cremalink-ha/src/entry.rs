//! Per-entry runtime context

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use cremalink_device::Device;
use ha_core::DeviceInfo;

use crate::constants::{DEFAULT_PROFILE, DOMAIN, MANUFACTURER, PROFILE_MAX, PROFILE_MIN};
use crate::coordinator::{PropertiesCoordinator, StatusCoordinator};

/// Everything one loaded config entry owns
///
/// Built once during setup and handed to every entity of the entry.
pub struct CremalinkEntry {
    pub entry_id: String,
    pub title: String,
    pub device: Arc<dyn Device>,
    /// Commands from the device map, read once at setup
    pub commands: Vec<String>,
    pub coordinator: Arc<StatusCoordinator>,
    /// Cloud machines only
    pub properties: Option<Arc<PropertiesCoordinator>>,
    selected_profile: AtomicU8,
}

impl CremalinkEntry {
    pub fn new(
        entry_id: impl Into<String>,
        title: impl Into<String>,
        device: Arc<dyn Device>,
        commands: Vec<String>,
        coordinator: Arc<StatusCoordinator>,
        properties: Option<Arc<PropertiesCoordinator>>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            title: title.into(),
            device,
            commands,
            coordinator,
            properties,
            selected_profile: AtomicU8::new(DEFAULT_PROFILE),
        }
    }

    pub fn is_cloud(&self) -> bool {
        self.properties.is_some()
    }

    pub fn unique_id(&self, key: &str) -> String {
        format!("{}_{}", self.entry_id, key)
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(DOMAIN, &self.entry_id, &self.title).with_manufacturer(MANUFACTURER)
    }

    pub fn has_command(&self, command: &str) -> bool {
        self.commands.iter().any(|c| c.eq_ignore_ascii_case(command))
    }

    pub fn selected_profile(&self) -> u8 {
        self.selected_profile.load(Ordering::SeqCst)
    }

    /// Store the profile used for brewing; numbers outside 1-4 are rejected
    pub fn set_selected_profile(&self, profile: u8) -> bool {
        if !(PROFILE_MIN..=PROFILE_MAX).contains(&profile) {
            return false;
        }
        self.selected_profile.store(profile, Ordering::SeqCst);
        true
    }

    /// Profile passed along with commands: the selection for cloud
    /// machines, none for local ones
    pub fn command_profile(&self) -> Option<u8> {
        self.is_cloud().then(|| self.selected_profile())
    }

    /// Stop both coordinators
    pub fn shutdown(&self) {
        self.coordinator.shutdown();
        if let Some(properties) = &self.properties {
            properties.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{properties_coordinator, status_coordinator};
    use cremalink_device::SimulatedDevice;

    fn entry(cloud: bool) -> CremalinkEntry {
        let device: Arc<dyn Device> = Arc::new(SimulatedDevice::new("DSN1", cloud));
        CremalinkEntry::new(
            "e1",
            "Kitchen",
            Arc::clone(&device),
            vec!["wakeup".into(), "Espresso".into()],
            status_coordinator(Arc::clone(&device), cloud),
            cloud.then(|| properties_coordinator(device)),
        )
    }

    #[test]
    fn test_profile_range_enforced() {
        let entry = entry(true);
        assert_eq!(entry.selected_profile(), 1);
        assert!(entry.set_selected_profile(4));
        assert!(!entry.set_selected_profile(0));
        assert!(!entry.set_selected_profile(5));
        assert_eq!(entry.selected_profile(), 4);
        assert_eq!(entry.command_profile(), Some(4));
    }

    #[test]
    fn test_local_commands_carry_no_profile() {
        let entry = entry(false);
        entry.set_selected_profile(2);
        assert_eq!(entry.command_profile(), None);
        assert!(entry.has_command("espresso"));
        assert_eq!(entry.unique_id("status_name"), "e1_status_name");
    }
}
