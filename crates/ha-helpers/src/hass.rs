//! The host bundle handed to integrations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ha_config_entries::ConfigEntries;
use ha_service_registry::{ServiceError, ServiceRegistry};
use ha_state_store::{RestoreStateStore, StateStore, Storage};
use tracing::{info, warn};

use crate::entity_manager::EntityManager;

/// Host configuration
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub config_dir: PathBuf,
}

impl HostConfig {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Path relative to the config directory
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.config_dir.join(relative)
    }
}

pub struct HomeAssistant {
    pub config: HostConfig,
    pub states: Arc<StateStore>,
    pub services: Arc<ServiceRegistry>,
    pub config_entries: Arc<ConfigEntries>,
    pub entities: Arc<EntityManager>,
    pub restore: Arc<RestoreStateStore>,
}

impl HomeAssistant {
    /// Build the host and register the entity platform services
    pub fn new(config: HostConfig) -> Result<Arc<Self>, ServiceError> {
        let states = Arc::new(StateStore::new());
        let services = Arc::new(ServiceRegistry::new());
        let restore = Arc::new(RestoreStateStore::new(Storage::new(&config.config_dir)));
        let entities = Arc::new(EntityManager::new(
            Arc::clone(&states),
            Arc::clone(&restore),
        ));
        entities.register_platform_services(&services)?;

        Ok(Arc::new(Self {
            config,
            states,
            services,
            config_entries: Arc::new(ConfigEntries::new()),
            entities,
            restore,
        }))
    }

    /// Load persisted state; a missing or unreadable file starts empty
    pub async fn async_start(&self) {
        match self.restore.load().await {
            Ok(count) => info!("Host started with {} restorable states", count),
            Err(e) => warn!("Could not load restore state: {}", e),
        }
    }

    /// Unload every config entry, which persists restorable states
    pub async fn async_stop(&self) {
        self.config_entries.unload_all().await;
        info!("Host stopped");
    }
}
