//! Machine properties
//!
//! [`MachineProperties`] is the typed view of one raw property snapshot.
//! Sensors bind to it through the description tables at the bottom of this
//! file instead of reading raw keys.

use std::collections::BTreeMap;

use cremalink_device::{keys, RawProperties};
use ha_core::{EntityCategory, SensorStateClass, PERCENTAGE};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::constants::{PROFILE_MAX, PROFILE_MIN};

/// Parameters of one beverage as stored for one profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub beverage: String,
    pub profile: u8,
    pub params: IndexMap<String, i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintenance {
    pub total_water_ml: Option<u64>,
    pub grounds_count: Option<u64>,
    pub descale_percent: Option<u8>,
    pub filter_percent: Option<u8>,
    pub descale_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub water_hardness: Option<u8>,
    pub auto_off_minutes: Option<u32>,
    pub energy_saving: Option<bool>,
    pub cup_lighting: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub firmware_version: Option<String>,
    pub serial_number: Option<String>,
    pub wifi_rssi: Option<i64>,
}

/// Slow-changing machine data, replaced wholesale on every poll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineProperties {
    pub counters: IndexMap<String, u64>,
    /// Profile number (1-4) -> name
    pub profile_names: BTreeMap<u8, String>,
    pub recipes: Vec<Recipe>,
    pub favorites: BTreeMap<u8, Vec<String>>,
    pub maintenance: Maintenance,
    pub settings: Settings,
    pub service_parameters: IndexMap<String, Value>,
    pub bean_slots: BTreeMap<u8, String>,
    pub diagnostics: Diagnostics,
}

fn profile_number(s: &str) -> Option<u8> {
    s.parse::<u8>()
        .ok()
        .filter(|n| (PROFILE_MIN..=PROFILE_MAX).contains(n))
}

fn as_u64(v: &Value) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn as_bool(v: &Value) -> Option<bool> {
    v.as_bool().or_else(|| v.as_u64().map(|n| n != 0))
}

fn as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl MachineProperties {
    /// Build the typed view of a raw snapshot
    ///
    /// Entries with an unexpected key shape or value type are skipped.
    pub fn from_raw(raw: &RawProperties) -> Self {
        let mut props = MachineProperties::default();

        for (beverage, value) in raw.with_prefix(keys::COUNTER) {
            if let Some(count) = as_u64(value) {
                props.counters.insert(beverage.to_string(), count);
            }
        }

        for (rest, value) in raw.with_prefix(keys::PROFILE) {
            let Some(n) = rest
                .strip_suffix(keys::PROFILE_NAME_SUFFIX)
                .and_then(profile_number)
            else {
                continue;
            };
            if let Some(name) = value.as_str() {
                props.profile_names.insert(n, name.to_string());
            }
        }

        for (rest, value) in raw.with_prefix(keys::RECIPE) {
            let Some((n, beverage)) = rest.split_once('.') else {
                continue;
            };
            let (Some(profile), Some(params)) = (profile_number(n), value.as_object()) else {
                continue;
            };
            props.recipes.push(Recipe {
                beverage: beverage.to_string(),
                profile,
                params: params
                    .iter()
                    .filter_map(|(k, v)| v.as_i64().map(|v| (k.clone(), v)))
                    .collect(),
            });
        }

        for (n, value) in raw.with_prefix(keys::FAVORITES) {
            if let (Some(profile), Some(list)) = (profile_number(n), value.as_array()) {
                let beverages = list
                    .iter()
                    .filter_map(|b| b.as_str().map(String::from))
                    .collect();
                props.favorites.insert(profile, beverages);
            }
        }

        for (field, value) in raw.with_prefix(keys::MAINTENANCE) {
            let m = &mut props.maintenance;
            match field {
                "total_water_ml" => m.total_water_ml = as_u64(value),
                "grounds_count" => m.grounds_count = as_u64(value),
                "descale_percent" => m.descale_percent = as_u64(value).map(clamp_percent),
                "filter_percent" => m.filter_percent = as_u64(value).map(clamp_percent),
                "descale_count" => m.descale_count = as_u64(value),
                other => debug!("Ignoring unknown maintenance field {}", other),
            }
        }

        for (field, value) in raw.with_prefix(keys::SETTING) {
            let s = &mut props.settings;
            match field {
                "water_hardness" => s.water_hardness = as_u64(value).map(|v| v.min(255) as u8),
                "auto_off_minutes" => {
                    s.auto_off_minutes = as_u64(value).map(|v| v.min(u32::MAX as u64) as u32)
                }
                "energy_saving" => s.energy_saving = as_bool(value),
                "cup_lighting" => s.cup_lighting = as_bool(value),
                other => debug!("Ignoring unknown setting {}", other),
            }
        }

        for (name, value) in raw.with_prefix(keys::SERVICE) {
            props
                .service_parameters
                .insert(name.to_string(), value.clone());
        }

        for (n, value) in raw.with_prefix(keys::BEAN_SLOT) {
            if let (Ok(slot), Some(name)) = (n.parse::<u8>(), value.as_str()) {
                props.bean_slots.insert(slot, name.to_string());
            }
        }

        for (field, value) in raw.with_prefix(keys::DIAGNOSTIC) {
            let d = &mut props.diagnostics;
            match field {
                "firmware_version" => d.firmware_version = as_string(value),
                "serial_number" => d.serial_number = as_string(value),
                "wifi_rssi" => d.wifi_rssi = value.as_i64(),
                other => debug!("Ignoring unknown diagnostic {}", other),
            }
        }

        props
    }

    /// Recipe used for a beverage's button attributes
    ///
    /// Beverage names match ignoring case. Profile 1's recipe wins;
    /// otherwise the first recipe listed for the beverage.
    pub fn recipe_for(&self, beverage: &str) -> Option<&Recipe> {
        let mut first = None;
        for recipe in self.recipes.iter().filter(|r| r.beverage.eq_ignore_ascii_case(beverage)) {
            if recipe.profile == 1 {
                return Some(recipe);
            }
            if first.is_none() {
                first = Some(recipe);
            }
        }
        first
    }

    /// Profile number whose name is exactly `name`
    pub fn profile_by_name(&self, name: &str) -> Option<u8> {
        profile_by_name(&self.profile_names, name)
    }
}

pub(crate) fn profile_by_name(names: &BTreeMap<u8, String>, name: &str) -> Option<u8> {
    names
        .iter()
        .find(|(_, n)| n.as_str() == name)
        .map(|(num, _)| *num)
}

fn clamp_percent(v: u64) -> u8 {
    v.min(100) as u8
}

/// A property sensor bound to one typed field
pub struct PropertySensorDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub unit: Option<&'static str>,
    pub state_class: Option<SensorStateClass>,
    pub category: Option<EntityCategory>,
    pub value: fn(&MachineProperties) -> Option<String>,
}

fn opt<T: ToString>(v: Option<&T>) -> Option<String> {
    v.map(|v| v.to_string())
}

fn on_off(v: Option<bool>) -> Option<String> {
    v.map(|b| if b { "on" } else { "off" }.to_string())
}

pub static MAINTENANCE_SENSORS: &[PropertySensorDescription] = &[
    PropertySensorDescription {
        key: "total_water",
        name: "Total Water",
        icon: "mdi:water",
        unit: Some("mL"),
        state_class: Some(SensorStateClass::TotalIncreasing),
        category: None,
        value: |p| opt(p.maintenance.total_water_ml.as_ref()),
    },
    PropertySensorDescription {
        key: "grounds_count",
        name: "Grounds Container",
        icon: "mdi:delete-variant",
        unit: None,
        state_class: Some(SensorStateClass::Measurement),
        category: None,
        value: |p| opt(p.maintenance.grounds_count.as_ref()),
    },
    PropertySensorDescription {
        key: "descale_percent",
        name: "Descale Status",
        icon: "mdi:water-alert",
        unit: Some(PERCENTAGE),
        state_class: Some(SensorStateClass::Measurement),
        category: None,
        value: |p| opt(p.maintenance.descale_percent.as_ref()),
    },
    PropertySensorDescription {
        key: "filter_percent",
        name: "Water Filter",
        icon: "mdi:filter",
        unit: Some(PERCENTAGE),
        state_class: Some(SensorStateClass::Measurement),
        category: None,
        value: |p| opt(p.maintenance.filter_percent.as_ref()),
    },
    PropertySensorDescription {
        key: "descale_count",
        name: "Descale Count",
        icon: "mdi:counter",
        unit: None,
        state_class: Some(SensorStateClass::TotalIncreasing),
        category: Some(EntityCategory::Diagnostic),
        value: |p| opt(p.maintenance.descale_count.as_ref()),
    },
];

pub static SETTING_SENSORS: &[PropertySensorDescription] = &[
    PropertySensorDescription {
        key: "water_hardness",
        name: "Water Hardness",
        icon: "mdi:water-opacity",
        unit: None,
        state_class: None,
        category: Some(EntityCategory::Config),
        value: |p| opt(p.settings.water_hardness.as_ref()),
    },
    PropertySensorDescription {
        key: "auto_off",
        name: "Auto Off",
        icon: "mdi:timer-off-outline",
        unit: Some("min"),
        state_class: None,
        category: Some(EntityCategory::Config),
        value: |p| opt(p.settings.auto_off_minutes.as_ref()),
    },
    PropertySensorDescription {
        key: "energy_saving",
        name: "Energy Saving",
        icon: "mdi:leaf",
        unit: None,
        state_class: None,
        category: Some(EntityCategory::Config),
        value: |p| on_off(p.settings.energy_saving),
    },
    PropertySensorDescription {
        key: "cup_lighting",
        name: "Cup Lighting",
        icon: "mdi:lightbulb-outline",
        unit: None,
        state_class: None,
        category: Some(EntityCategory::Config),
        value: |p| on_off(p.settings.cup_lighting),
    },
];

pub static DIAGNOSTIC_SENSORS: &[PropertySensorDescription] = &[
    PropertySensorDescription {
        key: "firmware_version",
        name: "Firmware",
        icon: "mdi:chip",
        unit: None,
        state_class: None,
        category: Some(EntityCategory::Diagnostic),
        value: |p| p.diagnostics.firmware_version.clone(),
    },
    PropertySensorDescription {
        key: "serial_number",
        name: "Serial Number",
        icon: "mdi:identifier",
        unit: None,
        state_class: None,
        category: Some(EntityCategory::Diagnostic),
        value: |p| p.diagnostics.serial_number.clone(),
    },
    PropertySensorDescription {
        key: "wifi_rssi",
        name: "WiFi Signal",
        icon: "mdi:wifi",
        unit: Some("dBm"),
        state_class: Some(SensorStateClass::Measurement),
        category: Some(EntityCategory::Diagnostic),
        value: |p| opt(p.diagnostics.wifi_rssi.as_ref()),
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipe(beverage: &str, profile: u8, coffee_ml: i64) -> Recipe {
        Recipe {
            beverage: beverage.to_string(),
            profile,
            params: IndexMap::from([("coffee_ml".to_string(), coffee_ml)]),
        }
    }

    fn with_recipes(recipes: Vec<Recipe>) -> MachineProperties {
        MachineProperties {
            recipes,
            ..Default::default()
        }
    }

    #[test]
    fn test_recipe_prefers_profile_one() {
        let props = with_recipes(vec![
            recipe("espresso", 2, 30),
            recipe("espresso", 1, 40),
            recipe("espresso", 3, 50),
        ]);
        assert_eq!(props.recipe_for("espresso").unwrap().profile, 1);
    }

    #[test]
    fn test_recipe_sole_match_and_none() {
        let props = with_recipes(vec![recipe("espresso", 1, 40), recipe("cappuccino", 3, 60)]);
        let only = props.recipe_for("cappuccino").unwrap();
        assert_eq!((only.profile, only.params["coffee_ml"]), (3, 60));
        assert!(props.recipe_for("latte_macchiato").is_none());
    }

    #[test]
    fn test_recipe_first_listed_without_profile_one() {
        let props = with_recipes(vec![recipe("tea", 4, 1), recipe("tea", 2, 2)]);
        assert_eq!(props.recipe_for("tea").unwrap().profile, 4);
    }

    #[test]
    fn test_recipe_ignores_case() {
        let props = with_recipes(vec![recipe("espresso", 1, 40)]);
        assert_eq!(props.recipe_for("Espresso").unwrap().params["coffee_ml"], 40);
    }

    #[test]
    fn test_from_raw() {
        let raw = RawProperties::new()
            .with("counter.espresso", json!(948))
            .with("counter.latte_macchiato", json!(0))
            .with("profile.1.name", json!("Anna"))
            .with("profile.2.name", json!("Ben"))
            .with("profile.7.name", json!("Out of range"))
            .with("recipe.2.espresso", json!({"coffee_ml": 30, "taste": 4}))
            .with("recipe.x.espresso", json!({"coffee_ml": 1}))
            .with("favorites.1", json!(["espresso"]))
            .with("maintenance.descale_percent", json!(140))
            .with("setting.energy_saving", json!(1))
            .with("service.pump_hours", json!(41))
            .with("bean_slot.1", json!("House Blend"))
            .with("diagnostic.firmware_version", json!("1.2.7"));

        let props = MachineProperties::from_raw(&raw);

        assert_eq!(props.counters["espresso"], 948);
        assert_eq!(props.counters["latte_macchiato"], 0);
        assert_eq!(
            props.profile_names,
            BTreeMap::from([(1, "Anna".to_string()), (2, "Ben".to_string())])
        );
        assert_eq!(props.recipes.len(), 1);
        assert_eq!(props.recipes[0].params["taste"], 4);
        assert_eq!(props.favorites[&1], vec!["espresso".to_string()]);
        assert_eq!(props.maintenance.descale_percent, Some(100));
        assert_eq!(props.settings.energy_saving, Some(true));
        assert_eq!(props.service_parameters["pump_hours"], json!(41));
        assert_eq!(props.bean_slots[&1], "House Blend");
        assert_eq!(props.profile_by_name("Ben"), Some(2));
        assert_eq!(props.profile_by_name("ben"), None);

        let firmware = DIAGNOSTIC_SENSORS
            .iter()
            .find(|d| d.key == "firmware_version")
            .unwrap();
        assert_eq!((firmware.value)(&props).as_deref(), Some("1.2.7"));
    }
}
