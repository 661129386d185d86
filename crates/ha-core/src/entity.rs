//! Entity metadata shared between the host and integrations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity platform (the domain part of the generated entity ID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    BinarySensor,
    Button,
    Select,
    Sensor,
    Switch,
}

impl Platform {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Platform::BinarySensor => "binary_sensor",
            Platform::Button => "button",
            Platform::Select => "select",
            Platform::Sensor => "sensor",
            Platform::Switch => "switch",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a non-primary entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    /// Changes device configuration
    Config,
    /// Read-only diagnostics (profile names, firmware, signal strength)
    Diagnostic,
}

/// How a sensor's numeric value evolves, used by long-term statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStateClass {
    Measurement,
    Total,
    TotalIncreasing,
}

impl SensorStateClass {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SensorStateClass::Measurement => "measurement",
            SensorStateClass::Total => "total",
            SensorStateClass::TotalIncreasing => "total_increasing",
        }
    }
}

/// Device an entity belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// `(domain, id)` pairs identifying the device
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
}

impl DeviceInfo {
    pub fn new(domain: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifiers: vec![(domain.into(), id.into())],
            name: name.into(),
            manufacturer: None,
        }
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }
}
