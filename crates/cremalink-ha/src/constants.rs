//! Constants for the Cremalink integration

use std::time::Duration;

pub const DOMAIN: &str = "cremalink_ha";
pub const MANUFACTURER: &str = "cremalink";

pub const CONF_CONNECTION_TYPE: &str = "connection_type";
pub const CONF_DSN: &str = "dsn";
pub const CONF_DEVICE_MAP: &str = "device_map";
pub const CONF_ADDON_URL: &str = "addon_url";
pub const CONF_LAN_KEY: &str = "lan_key";
pub const CONF_DEVICE_IP: &str = "device_ip";
pub const CONF_TOKEN_FILE: &str = "token_file";

pub const CONNECTION_LOCAL: &str = "local";
pub const CONNECTION_CLOUD: &str = "cloud";

pub const DEFAULT_ADDON_URL: &str = "http://localhost:10280";
pub const DEFAULT_ADDON_PORT: u16 = 80;

/// Directory below the config dir holding `custom:<file>` device maps
pub const CUSTOM_MAP_DIR: &str = "cremalink_custom_maps";
pub const CUSTOM_MAP_PREFIX: &str = "custom:";
/// Directory below the config dir holding cloud token files
pub const TOKEN_DIR: &str = "cremalink_tokens";

pub const SERVICE_BREW: &str = "brew";

/// Optional integer parameters of the brew service
pub const BREW_PARAMS: &[&str] = &[
    "coffee_ml",
    "milk_ml",
    "water_ml",
    "temperature",
    "taste",
    "aroma",
    "foam_level",
    "milk_temp",
];

pub const SCAN_INTERVAL: Duration = Duration::from_secs(1);
pub const STANDBY_SCAN_INTERVAL: Duration = Duration::from_secs(30);
pub const PROPERTIES_SCAN_INTERVAL: Duration = Duration::from_secs(300);
/// Re-activate the cloud app connection this often
pub const APP_ID_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Commands handled by the power switch rather than buttons
pub const POWER_COMMANDS: &[&str] = &["wakeup", "standby", "refresh"];
pub const CMD_WAKEUP: &str = "wakeup";
pub const CMD_STANDBY: &str = "standby";
pub const CMD_STOP: &str = "stop";

pub const PROFILE_MIN: u8 = 1;
pub const PROFILE_MAX: u8 = 4;
pub const DEFAULT_PROFILE: u8 = 1;
