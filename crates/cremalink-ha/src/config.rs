//! Config entry data
//!
//! The entry data is a flat JSON object. It is parsed once into an
//! [`EntryConfig`] and then narrowed into a [`Connection`] for the chosen
//! connection type.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::constants::{
    CONF_DEVICE_IP, CONF_LAN_KEY, CONF_TOKEN_FILE, CONNECTION_CLOUD, CONNECTION_LOCAL,
    CUSTOM_MAP_DIR, CUSTOM_MAP_PREFIX, DEFAULT_ADDON_PORT, DEFAULT_ADDON_URL, TOKEN_DIR,
};

#[derive(Debug, Error)]
pub enum EntryConfigError {
    #[error("invalid entry data: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("unknown connection type: {0}")]
    UnknownConnectionType(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid add-on URL '{url}': {reason}")]
    InvalidAddonUrl { url: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConfig {
    #[serde(default = "default_connection_type")]
    pub connection_type: String,
    pub dsn: String,
    /// Built-in map name, or `custom:<file>`
    pub device_map: String,
    #[serde(default = "default_addon_url")]
    pub addon_url: String,
    #[serde(default)]
    pub lan_key: Option<String>,
    #[serde(default)]
    pub device_ip: Option<String>,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

fn default_connection_type() -> String {
    CONNECTION_LOCAL.to_string()
}

fn default_addon_url() -> String {
    DEFAULT_ADDON_URL.to_string()
}

/// Where the device map comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMapSource {
    /// Shipped with the device SDK, resolved by name
    BuiltIn(String),
    /// A file below `<config_dir>/cremalink_custom_maps/`
    Custom(PathBuf),
}

/// Connection details, validated for the connection type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    Local {
        server_host: String,
        server_port: u16,
        device_ip: String,
        lan_key: String,
    },
    Cloud {
        token_file: PathBuf,
    },
}

impl Connection {
    pub fn is_cloud(&self) -> bool {
        matches!(self, Connection::Cloud { .. })
    }
}

impl EntryConfig {
    pub fn from_data(data: &HashMap<String, serde_json::Value>) -> Result<Self, EntryConfigError> {
        let object: serde_json::Map<String, serde_json::Value> =
            data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }

    pub fn device_map_source(&self, config_dir: &Path) -> DeviceMapSource {
        match self.device_map.strip_prefix(CUSTOM_MAP_PREFIX) {
            Some(file) => DeviceMapSource::Custom(config_dir.join(CUSTOM_MAP_DIR).join(file)),
            None => DeviceMapSource::BuiltIn(self.device_map.clone()),
        }
    }

    /// Validate the fields needed by the connection type
    ///
    /// A relative token file is looked up in `<config_dir>/cremalink_tokens/`.
    pub fn connection(&self, config_dir: &Path) -> Result<Connection, EntryConfigError> {
        match self.connection_type.as_str() {
            CONNECTION_LOCAL => {
                let (server_host, server_port) = parse_addon_url(&self.addon_url)?;
                Ok(Connection::Local {
                    server_host,
                    server_port,
                    device_ip: self
                        .device_ip
                        .clone()
                        .ok_or(EntryConfigError::MissingField(CONF_DEVICE_IP))?,
                    lan_key: self
                        .lan_key
                        .clone()
                        .ok_or(EntryConfigError::MissingField(CONF_LAN_KEY))?,
                })
            }
            CONNECTION_CLOUD => {
                let token_file = self
                    .token_file
                    .as_ref()
                    .ok_or(EntryConfigError::MissingField(CONF_TOKEN_FILE))?;
                let token_file = if token_file.is_absolute() {
                    token_file.clone()
                } else {
                    config_dir.join(TOKEN_DIR).join(token_file)
                };
                Ok(Connection::Cloud { token_file })
            }
            other => Err(EntryConfigError::UnknownConnectionType(other.to_string())),
        }
    }
}

/// Host and port of the local add-on server; the port defaults to 80
pub fn parse_addon_url(addon_url: &str) -> Result<(String, u16), EntryConfigError> {
    let invalid = |reason: String| EntryConfigError::InvalidAddonUrl {
        url: addon_url.to_string(),
        reason,
    };

    let url = Url::parse(addon_url).map_err(|e| invalid(e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| invalid("no host".to_string()))?
        .to_string();
    Ok((host, url.port().unwrap_or(DEFAULT_ADDON_PORT)))
}
