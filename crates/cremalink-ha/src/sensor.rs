//! Sensor platform

use std::sync::Arc;

use async_trait::async_trait;
use cremalink_device::MonitorSnapshot;
use ha_core::{EntityCategory, Platform, SensorStateClass, PERCENTAGE};
use ha_helpers::{Entity, EntityInfo};
use tokio::sync::watch;
use tracing::debug;

use crate::coordinator::{PropertiesCoordinator, StatusCoordinator};
use crate::entry::CremalinkEntry;
use crate::naming::{beverage_display, title_case};
use crate::properties::{
    MachineProperties, PropertySensorDescription, DIAGNOSTIC_SENSORS, MAINTENANCE_SENSORS,
    SETTING_SENSORS,
};

struct StatusSensorDescription {
    key: &'static str,
    name: &'static str,
    icon: &'static str,
    unit: Option<&'static str>,
    value: fn(&MonitorSnapshot) -> Option<String>,
}

static STATUS_SENSORS: &[StatusSensorDescription] = &[
    StatusSensorDescription {
        key: "status_name",
        name: "Status",
        icon: "mdi:coffee-maker",
        unit: None,
        value: |s| Some(s.status_name.clone()),
    },
    StatusSensorDescription {
        key: "progress_percent",
        name: "Progress",
        icon: "mdi:progress-clock",
        unit: Some(PERCENTAGE),
        value: |s| Some(s.progress_percent.to_string()),
    },
    StatusSensorDescription {
        key: "accessory_name",
        name: "Accessory",
        icon: "mdi:cup",
        unit: None,
        value: |s| s.accessory_name.clone(),
    },
];

/// A field of the status snapshot
pub struct StatusSensor {
    info: EntityInfo,
    coordinator: Arc<StatusCoordinator>,
    value: fn(&MonitorSnapshot) -> Option<String>,
}

impl StatusSensor {
    fn new(entry: &CremalinkEntry, description: &StatusSensorDescription) -> Self {
        let mut info = EntityInfo::new(
            entry.unique_id(description.key),
            Platform::Sensor,
            format!("{} {}", entry.title, description.name),
        )
        .with_icon(description.icon)
        .with_device(entry.device_info());
        if let Some(unit) = description.unit {
            info = info.with_unit(unit);
        }
        Self {
            info,
            coordinator: Arc::clone(&entry.coordinator),
            value: description.value,
        }
    }
}

#[async_trait]
impl Entity for StatusSensor {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn available(&self) -> bool {
        self.coordinator.data().is_some()
    }

    fn state(&self) -> Option<String> {
        self.coordinator.data().and_then(|s| (self.value)(&s))
    }

    fn update_signals(&self) -> Vec<watch::Receiver<u64>> {
        vec![self.coordinator.subscribe()]
    }
}

type PropertyValue = Arc<dyn Fn(&MachineProperties) -> Option<String> + Send + Sync>;

/// A value read from the machine properties
pub struct PropertySensor {
    info: EntityInfo,
    coordinator: Arc<PropertiesCoordinator>,
    value: PropertyValue,
}

impl PropertySensor {
    fn new(
        info: EntityInfo,
        coordinator: &Arc<PropertiesCoordinator>,
        value: PropertyValue,
    ) -> Self {
        Self {
            info,
            coordinator: Arc::clone(coordinator),
            value,
        }
    }

    fn from_description(
        entry: &CremalinkEntry,
        coordinator: &Arc<PropertiesCoordinator>,
        description: &'static PropertySensorDescription,
    ) -> Self {
        let mut info = EntityInfo::new(
            entry.unique_id(description.key),
            Platform::Sensor,
            format!("{} {}", entry.title, description.name),
        )
        .with_icon(description.icon)
        .with_device(entry.device_info());
        if let Some(unit) = description.unit {
            info = info.with_unit(unit);
        }
        if let Some(state_class) = description.state_class {
            info = info.with_state_class(state_class);
        }
        if let Some(category) = description.category {
            info = info.with_category(category);
        }
        Self::new(info, coordinator, Arc::new(description.value))
    }
}

#[async_trait]
impl Entity for PropertySensor {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn available(&self) -> bool {
        self.coordinator.data().is_some()
    }

    fn state(&self) -> Option<String> {
        self.coordinator.data().and_then(|p| (self.value)(&p))
    }

    fn update_signals(&self) -> Vec<watch::Receiver<u64>> {
        vec![self.coordinator.subscribe()]
    }
}

fn json_to_state(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Counter sensors for beverages brewed at least once
fn counter_sensors(
    entry: &CremalinkEntry,
    coordinator: &Arc<PropertiesCoordinator>,
    props: &MachineProperties,
) -> Vec<Arc<dyn Entity>> {
    props
        .counters
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(beverage, _)| {
            let (display, icon) = beverage_display(beverage);
            let info = EntityInfo::new(
                entry.unique_id(&format!("counter_{beverage}")),
                Platform::Sensor,
                format!("{} {} Count", entry.title, display),
            )
            .with_icon(icon)
            .with_unit("cups")
            .with_state_class(SensorStateClass::TotalIncreasing)
            .with_device(entry.device_info());

            let beverage = beverage.clone();
            let value: PropertyValue = Arc::new(move |p: &MachineProperties| {
                Some(p.counters.get(&beverage).copied().unwrap_or(0).to_string())
            });
            Arc::new(PropertySensor::new(info, coordinator, value)) as Arc<dyn Entity>
        })
        .collect()
}

fn profile_sensors(
    entry: &CremalinkEntry,
    coordinator: &Arc<PropertiesCoordinator>,
    props: &MachineProperties,
) -> Vec<Arc<dyn Entity>> {
    props
        .profile_names
        .iter()
        .filter(|(_, name)| !name.is_empty())
        .map(|(n, _)| {
            let info = EntityInfo::new(
                entry.unique_id(&format!("profile_{n}")),
                Platform::Sensor,
                format!("{} Profile {}", entry.title, n),
            )
            .with_icon("mdi:account")
            .with_category(EntityCategory::Diagnostic)
            .with_device(entry.device_info());

            let n = *n;
            let value: PropertyValue =
                Arc::new(move |p: &MachineProperties| p.profile_names.get(&n).cloned());
            Arc::new(PropertySensor::new(info, coordinator, value)) as Arc<dyn Entity>
        })
        .collect()
}

fn service_parameter_sensors(
    entry: &CremalinkEntry,
    coordinator: &Arc<PropertiesCoordinator>,
    props: &MachineProperties,
) -> Vec<Arc<dyn Entity>> {
    props
        .service_parameters
        .keys()
        .map(|name| {
            let info = EntityInfo::new(
                entry.unique_id(&format!("service_{name}")),
                Platform::Sensor,
                format!("{} {}", entry.title, title_case(name)),
            )
            .with_icon("mdi:wrench")
            .with_category(EntityCategory::Diagnostic)
            .with_device(entry.device_info());

            let name = name.clone();
            let value: PropertyValue = Arc::new(move |p: &MachineProperties| {
                p.service_parameters.get(&name).and_then(json_to_state)
            });
            Arc::new(PropertySensor::new(info, coordinator, value)) as Arc<dyn Entity>
        })
        .collect()
}

fn bean_slot_sensors(
    entry: &CremalinkEntry,
    coordinator: &Arc<PropertiesCoordinator>,
    props: &MachineProperties,
) -> Vec<Arc<dyn Entity>> {
    props
        .bean_slots
        .keys()
        .map(|n| {
            let info = EntityInfo::new(
                entry.unique_id(&format!("bean_slot_{n}")),
                Platform::Sensor,
                format!("{} Bean Slot {}", entry.title, n),
            )
            .with_icon("mdi:seed-outline")
            .with_device(entry.device_info());

            let n = *n;
            let value: PropertyValue =
                Arc::new(move |p: &MachineProperties| p.bean_slots.get(&n).cloned());
            Arc::new(PropertySensor::new(info, coordinator, value)) as Arc<dyn Entity>
        })
        .collect()
}

/// Sensors of one config entry
///
/// Property sensors are derived from the properties snapshot present at
/// setup; a field missing then gets no sensor.
pub fn build_entities(entry: &Arc<CremalinkEntry>) -> Vec<Arc<dyn Entity>> {
    let mut entities: Vec<Arc<dyn Entity>> = STATUS_SENSORS
        .iter()
        .map(|d| Arc::new(StatusSensor::new(entry, d)) as Arc<dyn Entity>)
        .collect();

    let Some(coordinator) = &entry.properties else {
        return entities;
    };
    let Some(props) = coordinator.data() else {
        debug!("No properties for {}, skipping property sensors", entry.title);
        return entities;
    };

    entities.extend(counter_sensors(entry, coordinator, &props));
    entities.extend(profile_sensors(entry, coordinator, &props));

    for description in MAINTENANCE_SENSORS
        .iter()
        .chain(SETTING_SENSORS)
        .chain(DIAGNOSTIC_SENSORS)
    {
        if (description.value)(&props).is_some() {
            entities.push(Arc::new(PropertySensor::from_description(
                entry,
                coordinator,
                description,
            )));
        }
    }

    entities.extend(service_parameter_sensors(entry, coordinator, &props));
    entities.extend(bean_slot_sensors(entry, coordinator, &props));
    entities
}
