//! Entity state storage with domain indexing
//!
//! This crate provides the StateStore, which tracks the current state of
//! every entity, and the RestoreStateStore, which persists the last known
//! states so entities can pick up where they left off after a restart.

pub mod restore;
pub mod storage;

pub use restore::{RestoreStateStore, StoredState, RESTORE_STATE_KEY};
pub use storage::{Storage, StorageError, StorageFile, StorageResult};

use dashmap::DashMap;
use ha_core::events::StateChangedData;
use ha_core::{Context, EntityId, State};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, instrument, trace};

/// Capacity of the state-change broadcast channel
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// The state store tracks all entity states
///
/// Writers replace a whole [`State`] at a time, so readers never see a
/// half-written value. Every write and removal is broadcast as
/// [`StateChangedData`] to subscribers.
pub struct StateStore {
    /// All entity states keyed by entity_id string
    states: DashMap<String, State>,
    /// Index of entity_ids by domain
    domain_index: DashMap<String, Vec<String>>,
    changes: broadcast::Sender<StateChangedData>,
}

impl StateStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            states: DashMap::new(),
            domain_index: DashMap::new(),
            changes,
        }
    }

    /// Set the state of an entity
    ///
    /// `last_changed` only moves when the state value differs from the
    /// previous one.
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> State {
        let key = entity_id.to_string();
        let old_state = self.get(&key);

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context),
            None => State::new(entity_id.clone(), state, attributes, context),
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map(|s| s.state != new_state.state).unwrap_or(true),
            "Setting entity state"
        );

        self.states.insert(key.clone(), new_state.clone());

        if old_state.is_none() {
            self.domain_index
                .entry(entity_id.domain().to_string())
                .or_default()
                .push(key);
        }

        // No receivers is fine
        let _ = self.changes.send(StateChangedData {
            entity_id,
            old_state,
            new_state: Some(new_state.clone()),
        });

        new_state
    }

    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Get the state value as a string
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.states.contains_key(entity_id)
    }

    /// Get all entity IDs for a domain, in insertion order
    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        self.domain_index
            .get(domain)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Get all states for a domain
    pub fn all(&self) -> Vec<State> {
        self.states.iter().map(|r| r.value().clone()).collect()
    }

    /// Remove an entity's state and broadcast the removal
    #[instrument(skip(self, context), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId, context: Context) -> Option<State> {
        let key = entity_id.to_string();
        let old_state = self.states.remove(&key).map(|(_, s)| s);

        if let Some(ref state) = old_state {
            trace!("Removing entity state");

            if let Some(mut ids) = self.domain_index.get_mut(entity_id.domain()) {
                ids.retain(|id| id != &key);
            }

            let _ = self.changes.send(StateChangedData {
                entity_id: entity_id.clone(),
                old_state: Some(state.clone()),
                new_state: None,
            });
            // Context is only carried for tracing here
            debug!(context_id = %context.id, "Entity state removed");
        }

        old_state
    }

    /// Subscribe to state writes and removals
    pub fn subscribe(&self) -> broadcast::Receiver<StateChangedData> {
        self.changes.subscribe()
    }

    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for StateStore
pub type SharedStateStore = Arc<StateStore>;
