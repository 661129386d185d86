//! In-memory coffee machine
//!
//! Answers like a real machine would, without any network: commands change
//! the status, a brew advances a quarter per status read and bumps the
//! beverage counter when done.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use serde_json::json;
use tracing::{debug, info};

use crate::beverages::BeverageCatalog;
use crate::device::{
    BrewParameters, Device, DeviceError, DeviceFactory, LocalDeviceParams, MonitorSnapshot,
    STATUS_STANDBY,
};
use crate::properties::RawProperties;

const STATUS_READY: i64 = 7;
const STATUS_BREWING: i64 = 8;

const POWER_COMMANDS: &[&str] = &["wakeup", "standby", "refresh", "stop"];
const MENU: &[&str] = &[
    "espresso",
    "coffee",
    "doppio_plus",
    "americano",
    "cappuccino",
    "latte_macchiato",
    "hot_water",
];

/// Device maps bundled with the simulator
const BUILTIN_MAPS: &[&str] = &["ECAM61075", "ECAM63050", "ECAM45086"];

#[derive(Debug)]
struct Machine {
    status_code: i64,
    brewing: Option<String>,
    progress: u8,
    counters: IndexMap<String, u64>,
    app_activations: u32,
}

impl Machine {
    fn status_name(&self) -> &'static str {
        match self.status_code {
            STATUS_STANDBY => "Standby",
            STATUS_BREWING => "Brewing",
            _ => "Ready",
        }
    }

    fn start_brew(&mut self, beverage: &str) -> Result<(), DeviceError> {
        if self.brewing.is_some() {
            return Err(DeviceError::Busy);
        }
        self.status_code = STATUS_BREWING;
        self.brewing = Some(beverage.to_string());
        self.progress = 0;
        Ok(())
    }
}

pub struct SimulatedDevice {
    dsn: String,
    cloud: bool,
    machine: Mutex<Machine>,
}

impl SimulatedDevice {
    pub fn new(dsn: impl Into<String>, cloud: bool) -> Self {
        let counters = MENU
            .iter()
            .map(|name| (name.to_string(), 0))
            .collect::<IndexMap<_, _>>();
        Self {
            dsn: dsn.into(),
            cloud,
            machine: Mutex::new(Machine {
                status_code: STATUS_STANDBY,
                brewing: None,
                progress: 0,
                counters,
                app_activations: 0,
            }),
        }
    }

    /// Preset a beverage counter
    pub fn app_activations(&self) -> u32 {
        self.machine().map(|m| m.app_activations).unwrap_or(0)
    }

    fn machine(&self) -> Result<MutexGuard<'_, Machine>, DeviceError> {
        self.machine
            .lock()
            .map_err(|_| DeviceError::Protocol("simulator state poisoned".into()))
    }

    fn is_beverage(name: &str) -> bool {
        MENU.contains(&name) || BeverageCatalog::new().get_by_name(name).is_some()
    }
}

impl Device for SimulatedDevice {
    fn dsn(&self) -> &str {
        &self.dsn
    }

    fn configure(&self) -> Result<(), DeviceError> {
        debug!(dsn = %self.dsn, cloud = self.cloud, "Configured simulated device");
        Ok(())
    }

    fn get_monitor(&self) -> Result<MonitorSnapshot, DeviceError> {
        let mut machine = self.machine()?;

        if let Some(beverage) = machine.brewing.clone() {
            machine.progress = machine.progress.saturating_add(25).min(100);
            if machine.progress >= 100 {
                *machine.counters.entry(beverage).or_insert(0) += 1;
                machine.brewing = None;
                machine.progress = 0;
                machine.status_code = STATUS_READY;
            }
        }

        Ok(MonitorSnapshot {
            status_code: machine.status_code,
            status_name: machine.status_name().to_string(),
            is_busy: machine.brewing.is_some(),
            progress_percent: machine.progress,
            accessory_name: Some("No accessory".to_string()),
        })
    }

    fn get_properties(&self) -> Result<RawProperties, DeviceError> {
        let machine = self.machine()?;

        let mut raw: RawProperties = machine
            .counters
            .iter()
            .map(|(name, count)| (format!("counter.{name}"), json!(count)))
            .collect();

        raw.insert("profile.1.name", json!("Anna"));
        raw.insert("profile.2.name", json!("Ben"));
        raw.insert("profile.3.name", json!(""));
        raw.insert(
            "recipe.1.espresso",
            json!({"coffee_ml": 40, "temperature": 2, "taste": 3}),
        );
        raw.insert(
            "recipe.2.espresso",
            json!({"coffee_ml": 30, "temperature": 3, "taste": 4}),
        );
        raw.insert(
            "recipe.2.cappuccino",
            json!({"coffee_ml": 60, "milk_ml": 120, "foam_level": 2}),
        );
        raw.insert("favorites.1", json!(["espresso", "cappuccino"]));
        raw.insert("maintenance.total_water_ml", json!(182_400));
        raw.insert("maintenance.grounds_count", json!(6));
        raw.insert("maintenance.descale_percent", json!(64));
        raw.insert("maintenance.filter_percent", json!(38));
        raw.insert("maintenance.descale_count", json!(3));
        raw.insert("setting.water_hardness", json!(3));
        raw.insert("setting.auto_off_minutes", json!(30));
        raw.insert("setting.energy_saving", json!(true));
        raw.insert("setting.cup_lighting", json!(false));
        raw.insert("service.brew_unit_cycles", json!(2_114));
        raw.insert("service.pump_hours", json!(41));
        raw.insert("bean_slot.1", json!("House Blend"));
        raw.insert("bean_slot.2", json!("Decaf"));
        raw.insert("diagnostic.firmware_version", json!("1.2.7"));
        raw.insert("diagnostic.serial_number", json!(self.dsn));
        raw.insert("diagnostic.wifi_rssi", json!(-58));

        Ok(raw)
    }

    fn get_commands(&self) -> Result<Vec<String>, DeviceError> {
        Ok(POWER_COMMANDS
            .iter()
            .chain(MENU)
            .map(|c| c.to_string())
            .collect())
    }

    fn execute(&self, command: &str, profile: Option<u8>) -> Result<(), DeviceError> {
        let mut machine = self.machine()?;
        debug!(command, ?profile, "Simulated command");

        match command.to_ascii_lowercase().as_str() {
            "wakeup" => {
                if machine.status_code == STATUS_STANDBY {
                    machine.status_code = STATUS_READY;
                }
            }
            "standby" => {
                machine.brewing = None;
                machine.progress = 0;
                machine.status_code = STATUS_STANDBY;
            }
            "refresh" => {}
            "stop" => {
                machine.brewing = None;
                machine.progress = 0;
                if machine.status_code != STATUS_STANDBY {
                    machine.status_code = STATUS_READY;
                }
            }
            beverage if MENU.contains(&beverage) => machine.start_brew(beverage)?,
            _ => return Err(DeviceError::UnknownCommand(command.to_string())),
        }
        Ok(())
    }

    fn brew_custom(
        &self,
        beverage: &str,
        params: Option<&BrewParameters>,
    ) -> Result<(), DeviceError> {
        if !Self::is_beverage(beverage) {
            return Err(DeviceError::UnknownCommand(beverage.to_string()));
        }
        debug!(beverage, ?params, "Simulated custom brew");
        self.machine()?.start_brew(beverage)
    }

    fn activate_app_connection(&self) -> Result<(), DeviceError> {
        if !self.cloud {
            return Ok(());
        }
        self.machine()?.app_activations += 1;
        Ok(())
    }
}

/// Factory handing out [`SimulatedDevice`]s
#[derive(Debug, Clone, Default)]
pub struct SimulatedFactory;

impl SimulatedFactory {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceFactory for SimulatedFactory {
    fn resolve_device_map(&self, name: &str) -> Result<PathBuf, DeviceError> {
        if BUILTIN_MAPS.contains(&name) {
            Ok(PathBuf::from("device_maps").join(format!("{name}.json")))
        } else {
            Err(DeviceError::InvalidMap {
                name: name.to_string(),
                reason: format!("available maps: {}", BUILTIN_MAPS.join(", ")),
            })
        }
    }

    fn create_local_device(
        &self,
        params: LocalDeviceParams,
    ) -> Result<Arc<dyn Device>, DeviceError> {
        info!(
            dsn = %params.dsn,
            server = %format!("{}:{}", params.server_host, params.server_port),
            "Creating simulated local device"
        );
        Ok(Arc::new(SimulatedDevice::new(params.dsn, false)))
    }

    fn create_cloud_device(
        &self,
        token_file: &Path,
        dsn: &str,
        device_map_path: &Path,
    ) -> Result<Option<Arc<dyn Device>>, DeviceError> {
        info!(
            dsn,
            token_file = %token_file.display(),
            map = %device_map_path.display(),
            "Creating simulated cloud device"
        );
        if dsn.is_empty() {
            return Ok(None);
        }
        Ok(Some(Arc::new(SimulatedDevice::new(dsn, true))))
    }
}
