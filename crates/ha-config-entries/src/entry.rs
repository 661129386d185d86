//! Config Entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::state_machine::InvalidTransition;

/// Config entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    /// Initial state, not yet set up
    #[default]
    NotLoaded,
    SetupInProgress,
    Loaded,
    /// Setup failed and will not be retried automatically
    SetupError,
    /// Setup failed with a transient error, a retry is scheduled
    SetupRetry,
    UnloadInProgress,
    /// Unload failed (terminal)
    FailedUnload,
}

impl ConfigEntryState {
    /// Check if the entry can be unloaded/reloaded from this state
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConfigEntryState::Loaded
                | ConfigEntryState::SetupError
                | ConfigEntryState::SetupRetry
                | ConfigEntryState::NotLoaded
        )
    }
}

/// A configuration entry for an integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain (e.g. "cremalink_ha")
    pub domain: String,

    /// Human-readable display name, also the device name
    pub title: String,

    /// Immutable configuration data
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    /// Optional unique identifier for duplicate prevention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(default)]
    pub disabled: bool,

    /// Current lifecycle state (not persisted)
    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Human-readable explanation for failed states
    #[serde(skip, default)]
    pub reason: Option<String>,

    /// Per-entry setup/unload lock (not persisted)
    #[serde(skip)]
    pub setup_lock: Arc<Mutex<()>>,

    /// Number of setup retry attempts (not persisted)
    #[serde(skip, default)]
    pub tries: u32,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ConfigEntry {
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            unique_id: None,
            disabled: false,
            state: ConfigEntryState::NotLoaded,
            reason: None,
            setup_lock: Arc::new(Mutex::new(())),
            tries: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }

    /// Transition to a new state, validated against the lifecycle rules
    pub fn try_set_state(
        &mut self,
        new_state: ConfigEntryState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.state.try_transition(new_state)?;

        self.state = new_state;
        self.reason = reason;

        // Retries are counted across SetupRetry -> SetupInProgress cycles only
        if !matches!(
            new_state,
            ConfigEntryState::SetupRetry | ConfigEntryState::SetupInProgress
        ) {
            self.tries = 0;
        }

        Ok(())
    }

    /// Increment the retry counter and return the new count
    pub fn increment_tries(&mut self) -> u32 {
        self.tries += 1;
        self.tries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_entry_builder() {
        let mut data = HashMap::new();
        data.insert("dsn".to_string(), json!("AC000W123456789"));

        let entry = ConfigEntry::new("cremalink_ha", "Kitchen")
            .with_data(data)
            .with_unique_id("AC000W123456789");

        assert_eq!(entry.state, ConfigEntryState::NotLoaded);
        assert_eq!(entry.data.get("dsn"), Some(&json!("AC000W123456789")));
        assert_eq!(entry.unique_id.as_deref(), Some("AC000W123456789"));
        assert!(!entry.entry_id.is_empty());
    }

    #[test]
    fn test_tries_reset_outside_retry_cycle() {
        let mut entry = ConfigEntry::new("cremalink_ha", "Kitchen");
        entry
            .try_set_state(ConfigEntryState::SetupInProgress, None)
            .unwrap();
        entry
            .try_set_state(ConfigEntryState::SetupRetry, Some("offline".into()))
            .unwrap();
        assert_eq!(entry.increment_tries(), 1);

        entry
            .try_set_state(ConfigEntryState::SetupInProgress, None)
            .unwrap();
        assert_eq!(entry.tries, 1);

        entry.try_set_state(ConfigEntryState::Loaded, None).unwrap();
        assert_eq!(entry.tries, 0);
        assert!(entry.is_loaded());
    }

    #[test]
    fn test_runtime_fields_not_persisted() {
        let mut entry = ConfigEntry::new("cremalink_ha", "Kitchen");
        entry.state = ConfigEntryState::Loaded;
        entry.reason = Some("ok".to_string());

        let json = serde_json::to_string(&entry).unwrap();
        let parsed: ConfigEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.title, "Kitchen");
        assert_eq!(parsed.state, ConfigEntryState::NotLoaded);
        assert!(parsed.reason.is_none());
    }
}
