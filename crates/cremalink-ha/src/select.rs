//! Select platform: the brew profile

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use ha_core::{Platform, State};
use ha_helpers::{Entity, EntityAction, EntityError, EntityInfo};
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::constants::{DEFAULT_PROFILE, PROFILE_MAX, PROFILE_MIN};
use crate::coordinator::PropertiesCoordinator;
use crate::entry::CremalinkEntry;
use crate::properties::profile_by_name;

/// Chooses whose recipes the buttons brew with
///
/// The selection itself lives in the entry so buttons can read it.
pub struct ProfileSelect {
    info: EntityInfo,
    entry: Arc<CremalinkEntry>,
    coordinator: Arc<PropertiesCoordinator>,
    /// Names seen at setup, used while the coordinator has none
    setup_names: BTreeMap<u8, String>,
}

impl ProfileSelect {
    pub fn new(
        entry: &Arc<CremalinkEntry>,
        coordinator: &Arc<PropertiesCoordinator>,
        setup_names: BTreeMap<u8, String>,
    ) -> Self {
        Self {
            info: EntityInfo::new(
                entry.unique_id("brew_profile"),
                Platform::Select,
                format!("{} Brew Profile", entry.title),
            )
            .with_icon("mdi:account-switch")
            .with_device(entry.device_info())
            .with_restore_state(),
            entry: Arc::clone(entry),
            coordinator: Arc::clone(coordinator),
            setup_names,
        }
    }

    fn profile_names(&self) -> BTreeMap<u8, String> {
        let names = match self.coordinator.data() {
            Some(props) if !props.profile_names.is_empty() => props.profile_names.clone(),
            _ => self.setup_names.clone(),
        };
        names
            .into_iter()
            .filter(|(n, name)| (PROFILE_MIN..=PROFILE_MAX).contains(n) && !name.is_empty())
            .collect()
    }

    pub fn options(&self) -> Vec<String> {
        self.profile_names().into_values().collect()
    }

    pub fn current_option(&self) -> String {
        let selected = self.entry.selected_profile();
        self.profile_names()
            .remove(&selected)
            .unwrap_or_else(|| format!("Profile {selected}"))
    }
}

#[async_trait]
impl Entity for ProfileSelect {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn state(&self) -> Option<String> {
        Some(self.current_option())
    }

    fn capability_attributes(&self) -> HashMap<String, serde_json::Value> {
        HashMap::from([("options".to_string(), json!(self.options()))])
    }

    fn update_signals(&self) -> Vec<watch::Receiver<u64>> {
        vec![self.coordinator.subscribe()]
    }

    async fn async_added_to_hass(&self, last_state: Option<State>) {
        let restored = last_state
            .as_ref()
            .and_then(|s| profile_by_name(&self.profile_names(), &s.state));

        let profile = match restored {
            Some(profile) => {
                debug!("Restored brew profile {} for {}", profile, self.entry.title);
                profile
            }
            None => DEFAULT_PROFILE,
        };
        self.entry.set_selected_profile(profile);
    }

    async fn async_handle_action(&self, action: EntityAction) -> Result<(), EntityError> {
        let EntityAction::SelectOption(option) = action else {
            return Err(EntityError::NotSupported {
                entity_id: self.info.unique_id.clone(),
                action: action.service_name().to_string(),
            });
        };

        let profile = profile_by_name(&self.profile_names(), &option)
            .ok_or_else(|| EntityError::InvalidOption(option.clone()))?;
        self.entry.set_selected_profile(profile);
        info!("Brew profile for {} set to {} ({})", self.entry.title, option, profile);
        Ok(())
    }
}

/// The profile select, when the machine reported at least one profile name
pub fn build_entities(entry: &Arc<CremalinkEntry>) -> Vec<Arc<dyn Entity>> {
    let Some(coordinator) = &entry.properties else {
        debug!("No properties coordinator, skipping select platform");
        return Vec::new();
    };
    let Some(props) = coordinator.data() else {
        debug!("Properties coordinator has no data, skipping select platform");
        return Vec::new();
    };
    if !props.profile_names.values().any(|name| !name.is_empty()) {
        debug!("No profile names found, skipping select platform");
        return Vec::new();
    }

    vec![Arc::new(ProfileSelect::new(
        entry,
        coordinator,
        props.profile_names.clone(),
    ))]
}
