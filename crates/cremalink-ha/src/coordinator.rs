//! Update coordinators for a Cremalink machine
//!
//! The status coordinator polls the machine monitor every second, backing
//! off to 30 seconds while the machine is in standby. Cloud machines also
//! get a properties coordinator on a five minute cadence.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cremalink_device::{Device, MonitorSnapshot};
use ha_helpers::{async_add_executor_job, DataUpdateCoordinator, DataUpdater, UpdateFailed};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::constants::{
    APP_ID_REFRESH_INTERVAL, PROPERTIES_SCAN_INTERVAL, SCAN_INTERVAL, STANDBY_SCAN_INTERVAL,
};
use crate::properties::MachineProperties;

pub type StatusCoordinator = DataUpdateCoordinator<StatusUpdater>;
pub type PropertiesCoordinator = DataUpdateCoordinator<PropertiesUpdater>;

#[derive(Debug, Default)]
struct AppConnection {
    last_activation: Option<Instant>,
    /// A failure has already been reported at warning level
    failure_reported: bool,
}

/// Polls the machine monitor
pub struct StatusUpdater {
    device: Arc<dyn Device>,
    /// Present for cloud machines, which need the app connection kept alive
    app_connection: Option<Mutex<AppConnection>>,
}

impl StatusUpdater {
    pub fn new(device: Arc<dyn Device>, cloud: bool) -> Self {
        Self {
            device,
            app_connection: cloud.then(|| Mutex::new(AppConnection::default())),
        }
    }

    /// Activate the cloud app connection if it never was, or refresh it
    /// once it is older than [`APP_ID_REFRESH_INTERVAL`]
    ///
    /// Failures never fail the poll. Activation is simply tried again on
    /// the next poll.
    async fn ensure_app_connection(&self) {
        let Some(app_connection) = &self.app_connection else {
            return;
        };
        let mut state = app_connection.lock().await;

        let due = match state.last_activation {
            None => true,
            Some(at) => at.elapsed() >= APP_ID_REFRESH_INTERVAL,
        };
        if !due {
            return;
        }

        let device = Arc::clone(&self.device);
        let result = async_add_executor_job(move || device.activate_app_connection())
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r.map_err(|e| e.to_string()));

        match result {
            Ok(()) => {
                debug!("App connection activated");
                state.last_activation = Some(Instant::now());
                state.failure_reported = false;
            }
            Err(e) if !state.failure_reported => {
                warn!("Could not activate app connection: {}", e);
                state.failure_reported = true;
            }
            Err(e) => debug!("Could not activate app connection: {}", e),
        }
    }
}

#[async_trait]
impl DataUpdater for StatusUpdater {
    type Data = MonitorSnapshot;

    async fn async_update_data(&self) -> Result<MonitorSnapshot, UpdateFailed> {
        self.ensure_app_connection().await;

        let device = Arc::clone(&self.device);
        async_add_executor_job(move || device.get_monitor())
            .await?
            .map_err(|e| UpdateFailed::new(format!("Error communicating with device: {e}")))
    }

    fn next_update_interval(&self, data: &MonitorSnapshot) -> Option<Duration> {
        Some(if data.is_standby() {
            STANDBY_SCAN_INTERVAL
        } else {
            SCAN_INTERVAL
        })
    }
}

/// Polls counters, profiles, recipes and the other slow-changing properties
pub struct PropertiesUpdater {
    device: Arc<dyn Device>,
}

impl PropertiesUpdater {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self { device }
    }
}

#[async_trait]
impl DataUpdater for PropertiesUpdater {
    type Data = MachineProperties;

    async fn async_update_data(&self) -> Result<MachineProperties, UpdateFailed> {
        let device = Arc::clone(&self.device);
        let raw = async_add_executor_job(move || device.get_properties())
            .await?
            .map_err(|e| UpdateFailed::new(format!("Error fetching properties: {e}")))?;
        Ok(MachineProperties::from_raw(&raw))
    }
}

pub fn status_coordinator(device: Arc<dyn Device>, cloud: bool) -> Arc<StatusCoordinator> {
    Arc::new(DataUpdateCoordinator::new(
        "cremalink_ha",
        StatusUpdater::new(device, cloud),
        SCAN_INTERVAL,
    ))
}

pub fn properties_coordinator(device: Arc<dyn Device>) -> Arc<PropertiesCoordinator> {
    Arc::new(DataUpdateCoordinator::new(
        "cremalink_ha_properties",
        PropertiesUpdater::new(device),
        PROPERTIES_SCAN_INTERVAL,
    ))
}
