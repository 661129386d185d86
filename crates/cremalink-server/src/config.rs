//! `configuration.yaml` of the server

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use cremalink_ha::DOMAIN;
use ha_config_entries::ConfigEntry;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "configuration.yaml";

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub cremalink_ha: Vec<EntryDefinition>,
}

/// One machine: a title plus the config entry data
#[derive(Debug, Deserialize)]
pub struct EntryDefinition {
    pub title: String,
    #[serde(flatten)]
    pub data: HashMap<String, serde_json::Value>,
}

impl EntryDefinition {
    /// The DSN doubles as unique ID so a machine is configured once
    pub fn into_config_entry(self) -> ConfigEntry {
        let unique_id = self
            .data
            .get("dsn")
            .and_then(|v| v.as_str())
            .map(String::from);
        let entry = ConfigEntry::new(DOMAIN, self.title).with_data(self.data);
        match unique_id {
            Some(id) => entry.with_unique_id(id),
            None => entry,
        }
    }
}

impl ServerConfig {
    /// Read `<config_dir>/configuration.yaml`; a missing file is an empty
    /// configuration
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        // An empty file parses to null
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}
