//! Raw property snapshot
//!
//! The device reports its slow-changing data as a flat, ordered map of
//! dotted keys. The prefixes are listed in [`keys`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Key prefixes of the raw property map
pub mod keys {
    /// `counter.<beverage>` -> integer
    pub const COUNTER: &str = "counter.";
    /// `profile.<n>.name` -> string
    pub const PROFILE: &str = "profile.";
    pub const PROFILE_NAME_SUFFIX: &str = ".name";
    /// `recipe.<n>.<beverage>` -> object of integer parameters
    pub const RECIPE: &str = "recipe.";
    /// `favorites.<n>` -> array of beverage names
    pub const FAVORITES: &str = "favorites.";
    /// `maintenance.<field>`
    pub const MAINTENANCE: &str = "maintenance.";
    /// `setting.<field>`
    pub const SETTING: &str = "setting.";
    /// `service.<name>`
    pub const SERVICE: &str = "service.";
    /// `bean_slot.<n>` -> bean name
    pub const BEAN_SLOT: &str = "bean_slot.";
    /// `diagnostic.<field>`
    pub const DIAGNOSTIC: &str = "diagnostic.";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawProperties(IndexMap<String, serde_json::Value>);

impl RawProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Entries under `prefix`, with the prefix stripped from the key
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a serde_json::Value)> + 'a {
        self.0
            .iter()
            .filter_map(move |(k, v)| k.strip_prefix(prefix).map(|rest| (rest, v)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, serde_json::Value)> for RawProperties {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefix_iteration_keeps_order() {
        let raw = RawProperties::new()
            .with("counter.latte", json!(3))
            .with("profile.1.name", json!("Alice"))
            .with("counter.espresso", json!(948));

        let counters: Vec<_> = raw.with_prefix(keys::COUNTER).collect();
        assert_eq!(
            counters,
            vec![("latte", &json!(3)), ("espresso", &json!(948))]
        );
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let raw = RawProperties::new().with("setting.water_hardness", json!(2));
        assert_eq!(
            serde_json::to_value(&raw).unwrap(),
            json!({"setting.water_hardness": 2})
        );
    }
}
