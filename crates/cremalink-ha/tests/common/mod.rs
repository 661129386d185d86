//! Shared fixtures: a scripted device, a factory handing it out, and a
//! host in a temporary config directory

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cremalink_device::{
    BrewParameters, Device, DeviceError, DeviceFactory, LocalDeviceParams, MonitorSnapshot,
    RawProperties,
};
use cremalink_ha::CremalinkIntegration;
use ha_config_entries::ConfigEntry;
use ha_helpers::{HomeAssistant, HostConfig};
use serde_json::json;
use tempfile::TempDir;

pub fn snapshot(status_code: i64, is_busy: bool) -> MonitorSnapshot {
    MonitorSnapshot {
        status_code,
        status_name: if status_code == 0 { "standby" } else { "ready" }.to_string(),
        is_busy,
        progress_percent: if is_busy { 50 } else { 0 },
        accessory_name: None,
    }
}

/// Device whose monitor readings are queued by the test
///
/// When the queue runs dry the last successful reading repeats.
pub struct FakeDevice {
    monitors: Mutex<VecDeque<Result<MonitorSnapshot, DeviceError>>>,
    last_monitor: Mutex<MonitorSnapshot>,
    properties: Mutex<Result<RawProperties, DeviceError>>,
    commands: Vec<String>,
    configure_error: Mutex<Option<DeviceError>>,
    pub executed: Mutex<Vec<(String, Option<u8>)>>,
    pub brews: Mutex<Vec<(String, Option<BrewParameters>)>>,
    pub activations: AtomicUsize,
    pub fail_activation: AtomicBool,
}

impl FakeDevice {
    pub fn new(commands: &[&str]) -> Self {
        Self {
            monitors: Mutex::new(VecDeque::new()),
            last_monitor: Mutex::new(snapshot(7, false)),
            properties: Mutex::new(Ok(RawProperties::new())),
            commands: commands.iter().map(|c| c.to_string()).collect(),
            configure_error: Mutex::new(None),
            executed: Mutex::new(Vec::new()),
            brews: Mutex::new(Vec::new()),
            activations: AtomicUsize::new(0),
            fail_activation: AtomicBool::new(false),
        }
    }

    pub fn push_monitor(&self, reading: Result<MonitorSnapshot, DeviceError>) {
        self.monitors.lock().unwrap().push_back(reading);
    }

    pub fn set_monitor(&self, reading: MonitorSnapshot) {
        *self.last_monitor.lock().unwrap() = reading;
    }

    pub fn set_properties(&self, properties: Result<RawProperties, DeviceError>) {
        *self.properties.lock().unwrap() = properties;
    }

    pub fn fail_configure(&self, error: DeviceError) {
        *self.configure_error.lock().unwrap() = Some(error);
    }

    pub fn executed(&self) -> Vec<(String, Option<u8>)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn brews(&self) -> Vec<(String, Option<BrewParameters>)> {
        self.brews.lock().unwrap().clone()
    }
}

impl Device for FakeDevice {
    fn dsn(&self) -> &str {
        "AC000W000000001"
    }

    fn configure(&self) -> Result<(), DeviceError> {
        match self.configure_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn get_monitor(&self) -> Result<MonitorSnapshot, DeviceError> {
        match self.monitors.lock().unwrap().pop_front() {
            Some(Ok(reading)) => {
                *self.last_monitor.lock().unwrap() = reading.clone();
                Ok(reading)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last_monitor.lock().unwrap().clone()),
        }
    }

    fn get_properties(&self) -> Result<RawProperties, DeviceError> {
        self.properties.lock().unwrap().clone()
    }

    fn get_commands(&self) -> Result<Vec<String>, DeviceError> {
        Ok(self.commands.clone())
    }

    fn execute(&self, command: &str, profile: Option<u8>) -> Result<(), DeviceError> {
        self.executed
            .lock()
            .unwrap()
            .push((command.to_string(), profile));
        Ok(())
    }

    fn brew_custom(
        &self,
        beverage: &str,
        params: Option<&BrewParameters>,
    ) -> Result<(), DeviceError> {
        self.brews
            .lock()
            .unwrap()
            .push((beverage.to_string(), params.cloned()));
        Ok(())
    }

    fn activate_app_connection(&self) -> Result<(), DeviceError> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        if self.fail_activation.load(Ordering::SeqCst) {
            Err(DeviceError::Connection("app id rejected".into()))
        } else {
            Ok(())
        }
    }
}

/// Hands out one [`FakeDevice`] for every connection type
pub struct FakeFactory {
    pub device: Option<Arc<FakeDevice>>,
    pub unknown_maps: bool,
    pub local_params: Mutex<Option<LocalDeviceParams>>,
}

impl FakeFactory {
    pub fn new(device: Arc<FakeDevice>) -> Self {
        Self {
            device: Some(device),
            unknown_maps: false,
            local_params: Mutex::new(None),
        }
    }

    /// The cloud account has no machines
    pub fn empty() -> Self {
        Self {
            device: None,
            unknown_maps: false,
            local_params: Mutex::new(None),
        }
    }
}

impl DeviceFactory for FakeFactory {
    fn resolve_device_map(&self, name: &str) -> Result<PathBuf, DeviceError> {
        if self.unknown_maps {
            return Err(DeviceError::InvalidMap {
                name: name.to_string(),
                reason: "not shipped".into(),
            });
        }
        Ok(PathBuf::from(format!("/maps/{name}.json")))
    }

    fn create_local_device(
        &self,
        params: LocalDeviceParams,
    ) -> Result<Arc<dyn Device>, DeviceError> {
        *self.local_params.lock().unwrap() = Some(params);
        match &self.device {
            Some(device) => Ok(Arc::clone(device) as Arc<dyn Device>),
            None => Err(DeviceError::Connection("no route to host".into())),
        }
    }

    fn create_cloud_device(
        &self,
        _token_file: &Path,
        _dsn: &str,
        _device_map_path: &Path,
    ) -> Result<Option<Arc<dyn Device>>, DeviceError> {
        Ok(self
            .device
            .as_ref()
            .map(|device| Arc::clone(device) as Arc<dyn Device>))
    }
}

pub struct TestHost {
    pub dir: TempDir,
    pub hass: Arc<HomeAssistant>,
    pub factory: Arc<FakeFactory>,
    pub integration: Arc<CremalinkIntegration>,
}

impl TestHost {
    pub fn new(factory: FakeFactory) -> Self {
        let dir = TempDir::new().unwrap();
        let hass = HomeAssistant::new(HostConfig::new(dir.path())).unwrap();
        let factory = Arc::new(factory);
        let integration = CremalinkIntegration::register(&hass, factory.clone());
        Self {
            dir,
            hass,
            factory,
            integration,
        }
    }

    /// Add an entry and run its setup, returning the entry ID
    pub async fn setup(&self, entry: ConfigEntry) -> String {
        let entry = self.hass.config_entries.add(entry).unwrap();
        // The outcome is read back from the entry state
        let _ = self.hass.config_entries.setup(&entry.entry_id).await;
        entry.entry_id
    }

    pub fn state(&self, entity_id: &str) -> Option<String> {
        self.hass.states.get_state(entity_id)
    }

    /// Entity ID registered for `<entry_id>_<key>`
    pub fn entity_id(&self, entry_id: &str, key: &str) -> String {
        self.hass
            .entities
            .entity_id_for_unique_id(&format!("{entry_id}_{key}"))
            .unwrap()
    }
}

fn entry(title: &str, data: serde_json::Value) -> ConfigEntry {
    let data: HashMap<String, serde_json::Value> = serde_json::from_value(data).unwrap();
    ConfigEntry::new("cremalink_ha", title).with_data(data)
}

pub fn local_entry(title: &str) -> ConfigEntry {
    entry(
        title,
        json!({
            "connection_type": "local",
            "dsn": "AC000W000000001",
            "device_map": "ECAM61075",
            "addon_url": "http://addon.local:10280",
            "lan_key": "secret",
            "device_ip": "192.168.1.20"
        }),
    )
}

pub fn cloud_entry(title: &str) -> ConfigEntry {
    entry(
        title,
        json!({
            "connection_type": "cloud",
            "dsn": "AC000W000000001",
            "device_map": "ECAM61075",
            "token_file": "kitchen.json"
        }),
    )
}

/// Properties of a machine with two named profiles and recipes for
/// espresso under both
pub fn cloud_properties() -> RawProperties {
    RawProperties::new()
        .with("counter.espresso", json!(12))
        .with("counter.cappuccino", json!(0))
        .with("profile.1.name", json!("Anna"))
        .with("profile.2.name", json!("Ben"))
        .with("recipe.2.espresso", json!({"coffee_ml": 30, "taste": 4}))
        .with("recipe.1.espresso", json!({"coffee_ml": 40, "taste": 3}))
        .with("maintenance.descale_percent", json!(35))
        .with("diagnostic.firmware_version", json!("1.2.3"))
}
