//! State type representing an entity's current state

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Context, EntityId, MAX_STATE_LENGTH, STATE_UNAVAILABLE, STATE_UNKNOWN};

/// The state of an entity at a point in time
///
/// The value is always a string; attributes carry everything else
/// (friendly name, icon, unit, select options, recipe parameters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub entity_id: EntityId,

    /// The state value (e.g. "on", "42", "Brewing", "unavailable")
    pub state: String,

    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state was last written, even if unchanged
    pub last_updated: DateTime<Utc>,

    pub context: Context,
}

impl State {
    /// Create a new state with current timestamp
    ///
    /// Values longer than [`MAX_STATE_LENGTH`] are replaced by `unknown`.
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: clamp_state(state.into()),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// Create the successor of this state, keeping `last_changed` when the
    /// value is the same
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        let new_state = clamp_state(new_state.into());
        let last_changed = if self.state == new_state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed,
            last_updated: now,
            context,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.state == STATE_UNAVAILABLE
    }

    pub fn is_unknown(&self) -> bool {
        self.state == STATE_UNKNOWN
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

fn clamp_state(state: String) -> String {
    if state.len() > MAX_STATE_LENGTH {
        STATE_UNKNOWN.to_string()
    } else {
        state
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps and context are not compared
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensor() -> EntityId {
        EntityId::new("sensor", "progress").unwrap()
    }

    #[test]
    fn test_last_changed_kept_for_same_value() {
        let first = State::new(sensor(), "10", HashMap::new(), Context::new());
        let same = first.with_update("10", HashMap::new(), Context::new());
        assert_eq!(same.last_changed, first.last_changed);

        let changed = same.with_update("20", HashMap::new(), Context::new());
        assert!(changed.last_changed >= first.last_changed);
        assert_eq!(changed.state, "20");
    }

    #[test]
    fn test_oversized_state_becomes_unknown() {
        let state = State::new(sensor(), "x".repeat(300), HashMap::new(), Context::new());
        assert!(state.is_unknown());
    }

    #[test]
    fn test_typed_attribute() {
        let mut attrs = HashMap::new();
        attrs.insert("options".to_string(), json!(["Alice", "Bob"]));
        let state = State::new(sensor(), "Alice", attrs, Context::new());

        let options: Vec<String> = state.attribute("options").unwrap();
        assert_eq!(options, vec!["Alice", "Bob"]);
        assert_eq!(state.attribute::<u32>("missing"), None);
    }
}
