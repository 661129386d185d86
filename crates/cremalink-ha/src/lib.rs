//! Cremalink coffee machine integration
//!
//! Exposes a De'Longhi machine reached through the Cremalink device SDK as
//! entities: status and property sensors, a busy binary sensor, one button
//! per command, a power switch and a brew profile select. All device I/O
//! goes through the blocking [`Device`] trait and runs on the executor.
//!
//! The integration is a [`ConfigEntryHandler`]; register it once with
//! [`CremalinkIntegration::register`] and add config entries for the
//! `cremalink_ha` domain.

pub mod binary_sensor;
pub mod button;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod entry;
pub mod naming;
pub mod properties;
pub mod select;
pub mod sensor;
pub mod services;
pub mod switch;

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use cremalink_device::{Device, DeviceError, DeviceFactory, LocalDeviceParams};
use ha_config_entries::{ConfigEntry, ConfigEntryHandler, SetupError};
use ha_core::ServiceCall;
use ha_helpers::{async_add_executor_job, Entity, EntityManager, HomeAssistant, HostConfig};
use ha_service_registry::{ServiceError, ServiceRegistry, ServiceResult};
use indexmap::IndexMap;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

pub use config::{Connection, DeviceMapSource, EntryConfig, EntryConfigError};
pub use constants::DOMAIN;
pub use entry::CremalinkEntry;
pub use properties::MachineProperties;

use crate::constants::SERVICE_BREW;
use crate::coordinator::{properties_coordinator, status_coordinator};
use crate::services::{brew_description, parse_brew_request};

pub struct CremalinkIntegration {
    this: Weak<Self>,
    config: HostConfig,
    services: Arc<ServiceRegistry>,
    entities: Arc<EntityManager>,
    factory: Arc<dyn DeviceFactory>,
    /// Loaded entries in setup order; the brew service uses the first
    entries: RwLock<IndexMap<String, Arc<CremalinkEntry>>>,
}

fn not_ready(e: impl Display) -> SetupError {
    SetupError::NotReady(format!("Could not connect to Cremalink device: {e}"))
}

impl CremalinkIntegration {
    /// Create the integration and register it as the `cremalink_ha`
    /// config entry handler
    pub fn register(hass: &HomeAssistant, factory: Arc<dyn DeviceFactory>) -> Arc<Self> {
        let integration = Arc::new_cyclic(|this| Self {
            this: this.clone(),
            config: hass.config.clone(),
            services: Arc::clone(&hass.services),
            entities: Arc::clone(&hass.entities),
            factory,
            entries: RwLock::new(IndexMap::new()),
        });
        hass.config_entries
            .register_handler(DOMAIN, Arc::clone(&integration) as Arc<dyn ConfigEntryHandler>);
        integration
    }

    pub async fn entry(&self, entry_id: &str) -> Option<Arc<CremalinkEntry>> {
        self.entries.read().await.get(entry_id).cloned()
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn resolve_device_map(&self, config: &EntryConfig) -> Result<PathBuf, String> {
        match config.device_map_source(&self.config.config_dir) {
            DeviceMapSource::Custom(path) => Ok(path),
            DeviceMapSource::BuiltIn(name) => {
                let factory = Arc::clone(&self.factory);
                async_add_executor_job(move || factory.resolve_device_map(&name))
                    .await
                    .map_err(|e| e.to_string())?
                    .map_err(|e| e.to_string())
            }
        }
    }

    /// Build the device handle, configure it and read its commands
    async fn connect(
        &self,
        dsn: &str,
        connection: Connection,
        device_map_path: PathBuf,
    ) -> Result<(Arc<dyn Device>, Vec<String>), SetupError> {
        let factory = Arc::clone(&self.factory);
        let device = match connection {
            Connection::Local {
                server_host,
                server_port,
                device_ip,
                lan_key,
            } => {
                let params = LocalDeviceParams {
                    dsn: dsn.to_string(),
                    server_host,
                    server_port,
                    device_ip,
                    lan_key,
                    device_map_path,
                };
                async_add_executor_job(move || factory.create_local_device(params))
                    .await
                    .map_err(not_ready)?
                    .map_err(not_ready)?
            }
            Connection::Cloud { token_file } => {
                let owned_dsn = dsn.to_string();
                async_add_executor_job(move || {
                    factory.create_cloud_device(&token_file, &owned_dsn, &device_map_path)
                })
                .await
                .map_err(not_ready)?
                .map_err(not_ready)?
                .ok_or_else(|| {
                    SetupError::NotReady(format!("Could not find cloud device with DSN {dsn}"))
                })?
            }
        };

        let handle = Arc::clone(&device);
        let commands = async_add_executor_job(move || -> Result<Vec<String>, DeviceError> {
            handle.configure()?;
            handle.get_commands()
        })
        .await
        .map_err(not_ready)?
        .map_err(not_ready)?;

        Ok((device, commands))
    }

    fn ensure_brew_service(&self) -> Result<(), ServiceError> {
        if self.services.has_service(DOMAIN, SERVICE_BREW) {
            return Ok(());
        }

        let this = self.this.clone();
        self.services
            .register_with_description(brew_description(), move |call: ServiceCall| {
                let this = this.clone();
                async move {
                    let integration = this.upgrade().ok_or_else(|| {
                        ServiceError::CallFailed("Cremalink integration is gone".to_string())
                    })?;
                    integration.brew(&call.service_data).await
                }
            })?;
        debug!("Registered {}.{}", DOMAIN, SERVICE_BREW);
        Ok(())
    }

    /// Brew on the first loaded machine
    async fn brew(&self, data: &serde_json::Value) -> ServiceResult {
        let (beverage, params) = parse_brew_request(data)?;

        let first = self.entries.read().await.values().next().cloned();
        let entry = first.ok_or_else(|| {
            ServiceError::CallFailed("No Cremalink machine is loaded".to_string())
        })?;

        info!("Brewing {} on {} with {:?}", beverage, entry.title, params);
        let device = Arc::clone(&entry.device);
        async_add_executor_job(move || device.brew_custom(&beverage, params.as_ref()))
            .await
            .map_err(|e| ServiceError::CallFailed(e.to_string()))?
            .map_err(|e| ServiceError::CallFailed(e.to_string()))?;

        entry.coordinator.async_request_refresh().await;
        Ok(None)
    }

    /// Drop an entry's context and entities, and the brew service with the
    /// last entry
    async fn release_entry(&self, entry_id: &str) -> Option<Arc<CremalinkEntry>> {
        let (removed, none_left) = {
            let mut entries = self.entries.write().await;
            let removed = entries.shift_remove(entry_id);
            (removed, entries.is_empty())
        };

        self.entities.remove_entities(entry_id).await;

        if none_left && self.services.unregister(DOMAIN, SERVICE_BREW) {
            debug!("Removed {}.{}", DOMAIN, SERVICE_BREW);
        }
        removed
    }

    fn platform_entities(entry: &Arc<CremalinkEntry>) -> Vec<Arc<dyn Entity>> {
        let mut entities = switch::build_entities(entry);
        entities.extend(button::build_entities(entry));
        entities.extend(sensor::build_entities(entry));
        entities.extend(binary_sensor::build_entities(entry));
        entities.extend(select::build_entities(entry));
        entities
    }
}

#[async_trait]
impl ConfigEntryHandler for CremalinkIntegration {
    #[instrument(skip(self, entry), fields(entry_id = %entry.entry_id, title = %entry.title))]
    async fn async_setup_entry(&self, entry: &ConfigEntry) -> Result<(), SetupError> {
        let config = EntryConfig::from_data(&entry.data).map_err(|e| {
            error!("Invalid config for {}: {}", entry.title, e);
            SetupError::Failed(e.to_string())
        })?;

        let device_map_path = self.resolve_device_map(&config).await.map_err(|e| {
            error!("Could not resolve device map '{}': {}", config.device_map, e);
            SetupError::Failed(format!("Could not resolve device map '{}'", config.device_map))
        })?;

        let connection = config.connection(&self.config.config_dir).map_err(|e| {
            error!("{}", e);
            SetupError::Failed(e.to_string())
        })?;
        let cloud = connection.is_cloud();

        let (device, commands) = self
            .connect(&config.dsn, connection, device_map_path)
            .await?;
        debug!("{} offers commands {:?}", entry.title, commands);

        let coordinator = status_coordinator(Arc::clone(&device), cloud);
        coordinator
            .async_config_entry_first_refresh()
            .await
            .map_err(|e| SetupError::NotReady(e.to_string()))?;

        let properties = if cloud {
            let properties = properties_coordinator(Arc::clone(&device));
            properties
                .async_config_entry_first_refresh()
                .await
                .map_err(|e| SetupError::NotReady(e.to_string()))?;
            Some(properties)
        } else {
            None
        };

        let context = Arc::new(CremalinkEntry::new(
            &entry.entry_id,
            &entry.title,
            device,
            commands,
            coordinator,
            properties,
        ));

        if let Err(e) = self.ensure_brew_service() {
            error!("Could not register brew service: {}", e);
            return Err(SetupError::Failed(e.to_string()));
        }

        self.entries
            .write()
            .await
            .insert(entry.entry_id.clone(), Arc::clone(&context));

        let entities = Self::platform_entities(&context);
        if let Err(e) = self.entities.add_entities(&entry.entry_id, entities).await {
            error!("Could not add entities for {}: {}", entry.title, e);
            self.release_entry(&entry.entry_id).await;
            return Err(SetupError::Failed(e.to_string()));
        }

        context.coordinator.start();
        if let Some(properties) = &context.properties {
            properties.start();
        }

        info!(
            "Set up {} ({} connection, {} commands)",
            entry.title,
            if cloud { "cloud" } else { "local" },
            context.commands.len()
        );
        Ok(())
    }

    #[instrument(skip(self, entry), fields(entry_id = %entry.entry_id))]
    async fn async_unload_entry(&self, entry: &ConfigEntry) -> bool {
        if let Some(context) = self.release_entry(&entry.entry_id).await {
            context.shutdown();
        }
        true
    }
}
