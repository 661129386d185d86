//! Device handle and factory

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::properties::RawProperties;

/// Status code reported while the machine is in standby
pub const STATUS_STANDBY: i64 = 0;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("unknown device map '{name}': {reason}")]
    InvalidMap { name: String, reason: String },

    #[error("device is busy")]
    Busy,

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Point-in-time reading of the machine status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub status_code: i64,
    pub status_name: String,
    pub is_busy: bool,
    pub progress_percent: u8,
    #[serde(default)]
    pub accessory_name: Option<String>,
}

impl MonitorSnapshot {
    pub fn is_standby(&self) -> bool {
        self.status_code == STATUS_STANDBY
    }
}

/// Named integer parameters for a custom brew, in the order given
pub type BrewParameters = IndexMap<String, i64>;

/// A configured connection to one machine
///
/// Every method blocks on device or cloud I/O.
pub trait Device: Send + Sync + 'static {
    /// Device serial number
    fn dsn(&self) -> &str;

    /// Load the device map and prepare the connection
    fn configure(&self) -> Result<(), DeviceError>;

    fn get_monitor(&self) -> Result<MonitorSnapshot, DeviceError>;

    fn get_properties(&self) -> Result<RawProperties, DeviceError>;

    /// Command names supported by the device map
    fn get_commands(&self) -> Result<Vec<String>, DeviceError>;

    /// Run a command, optionally with the recipe of a profile
    fn execute(&self, command: &str, profile: Option<u8>) -> Result<(), DeviceError>;

    /// Brew a beverage; `None` uses the machine's stored recipe
    fn brew_custom(
        &self,
        beverage: &str,
        params: Option<&BrewParameters>,
    ) -> Result<(), DeviceError>;

    /// Tell the cloud an app is watching so the machine keeps pushing
    /// live data. Local devices treat it as a no-op.
    fn activate_app_connection(&self) -> Result<(), DeviceError>;
}

/// Parameters for a device reached through the local add-on server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDeviceParams {
    pub dsn: String,
    pub server_host: String,
    pub server_port: u16,
    pub device_ip: String,
    pub lan_key: String,
    pub device_map_path: PathBuf,
}

/// Builds device handles; all methods block
pub trait DeviceFactory: Send + Sync + 'static {
    /// Path of a built-in device map by name
    fn resolve_device_map(&self, name: &str) -> Result<PathBuf, DeviceError>;

    fn create_local_device(&self, params: LocalDeviceParams)
        -> Result<Arc<dyn Device>, DeviceError>;

    /// `Ok(None)` when the account has no device with this serial
    fn create_cloud_device(
        &self,
        token_file: &Path,
        dsn: &str,
        device_map_path: &Path,
    ) -> Result<Option<Arc<dyn Device>>, DeviceError>;
}
