//! Restore state
//!
//! Keeps the last known state of entities that opted in, and persists them
//! to `.storage/core.restore_state` so that a restarted entity (for example
//! the brew profile selector) can read back what it showed before.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ha_core::State;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::{Storage, StorageFile, StorageResult};
use crate::StateStore;

pub const RESTORE_STATE_KEY: &str = "core.restore_state";
const STORAGE_VERSION: u32 = 1;
const STORAGE_MINOR_VERSION: u32 = 1;

/// Stored states for entities that are gone are dropped after this long
const STATE_EXPIRATION_DAYS: i64 = 7;

/// A persisted state plus the time its entity was last seen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredState {
    pub state: State,
    pub last_seen: DateTime<Utc>,
}

pub struct RestoreStateStore {
    storage: Storage,
    last_states: DashMap<String, StoredState>,
}

impl RestoreStateStore {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            last_states: DashMap::new(),
        }
    }

    /// Load stored states from disk, returning how many were read
    pub async fn load(&self) -> StorageResult<usize> {
        let Some(file) = self
            .storage
            .load::<Vec<StoredState>>(RESTORE_STATE_KEY, STORAGE_VERSION)
            .await?
        else {
            return Ok(0);
        };

        let count = file.data.len();
        for stored in file.data {
            self.last_states
                .insert(stored.state.entity_id.to_string(), stored);
        }
        info!("Loaded {} restorable states", count);
        Ok(count)
    }

    /// Last state recorded for an entity before the current run
    pub fn last_state(&self, entity_id: &str) -> Option<State> {
        self.last_states.get(entity_id).map(|s| s.state.clone())
    }

    /// Record a state so it survives the entity being removed
    ///
    /// `unavailable` and `unknown` carry no information and are ignored.
    pub fn remember(&self, state: &State) {
        if state.is_unavailable() || state.is_unknown() {
            return;
        }
        self.last_states.insert(
            state.entity_id.to_string(),
            StoredState {
                state: state.clone(),
                last_seen: Utc::now(),
            },
        );
    }

    /// Capture the current state of `entity_ids` and write every stored
    /// state that has not expired to disk
    pub async fn dump(&self, states: &StateStore, entity_ids: &[String]) -> StorageResult<()> {
        for entity_id in entity_ids {
            if let Some(state) = states.get(entity_id) {
                self.remember(&state);
            }
        }

        let cutoff = Utc::now() - Duration::days(STATE_EXPIRATION_DAYS);
        self.last_states.retain(|_, stored| stored.last_seen >= cutoff);

        let data: Vec<StoredState> = self
            .last_states
            .iter()
            .map(|r| r.value().clone())
            .collect();
        debug!("Dumping {} restorable states", data.len());

        self.storage
            .save(&StorageFile::new(
                RESTORE_STATE_KEY,
                data,
                STORAGE_VERSION,
                STORAGE_MINOR_VERSION,
            ))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_core::{Context, EntityId};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn select_id() -> EntityId {
        "select.kitchen_brew_profile".parse().unwrap()
    }

    #[tokio::test]
    async fn test_dump_and_reload() {
        let dir = TempDir::new().unwrap();
        let states = StateStore::new();
        states.set(select_id(), "Alice", HashMap::new(), Context::new());

        let restore = RestoreStateStore::new(Storage::new(dir.path()));
        restore
            .dump(&states, &["select.kitchen_brew_profile".to_string()])
            .await
            .unwrap();

        let reloaded = RestoreStateStore::new(Storage::new(dir.path()));
        assert_eq!(reloaded.load().await.unwrap(), 1);
        let last = reloaded.last_state("select.kitchen_brew_profile").unwrap();
        assert_eq!(last.state, "Alice");
    }

    #[tokio::test]
    async fn test_unavailable_not_remembered() {
        let dir = TempDir::new().unwrap();
        let restore = RestoreStateStore::new(Storage::new(dir.path()));
        let state = State::new(select_id(), "unavailable", HashMap::new(), Context::new());

        restore.remember(&state);
        assert!(restore.last_state("select.kitchen_brew_profile").is_none());
    }

    #[tokio::test]
    async fn test_load_without_file() {
        let dir = TempDir::new().unwrap();
        let restore = RestoreStateStore::new(Storage::new(dir.path()));
        assert_eq!(restore.load().await.unwrap(), 0);
    }
}
