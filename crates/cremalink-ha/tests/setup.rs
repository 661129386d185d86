mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::{cloud_entry, cloud_properties, local_entry, FakeDevice, FakeFactory, TestHost};
use cremalink_device::DeviceError;
use ha_config_entries::{ConfigEntry, ConfigEntryState};
use serde_json::json;

fn commands() -> &'static [&'static str] {
    &["wakeup", "standby", "refresh", "espresso", "cappuccino", "stop"]
}

fn entry_state(host: &TestHost, entry_id: &str) -> ConfigEntryState {
    host.hass.config_entries.get(entry_id).unwrap().state
}

#[tokio::test]
async fn test_local_setup_loads_entry() {
    let device = Arc::new(FakeDevice::new(commands()));
    let host = TestHost::new(FakeFactory::new(device));

    let entry_id = host.setup(local_entry("Kitchen")).await;

    assert_eq!(entry_state(&host, &entry_id), ConfigEntryState::Loaded);
    assert!(host.hass.services.has_service("cremalink_ha", "brew"));

    let context = host.integration.entry(&entry_id).await.unwrap();
    assert!(!context.is_cloud());
    assert_eq!(context.commands.len(), 6);
}

#[tokio::test]
async fn test_local_device_gets_parsed_addon_url() {
    let device = Arc::new(FakeDevice::new(commands()));
    let host = TestHost::new(FakeFactory::new(device));
    host.setup(local_entry("Kitchen")).await;

    let params = host.factory.local_params.lock().unwrap().clone().unwrap();
    assert_eq!(params.server_host, "addon.local");
    assert_eq!(params.server_port, 10280);
    assert_eq!(params.device_ip, "192.168.1.20");
    assert_eq!(params.device_map_path, PathBuf::from("/maps/ECAM61075.json"));
}

#[tokio::test]
async fn test_unknown_connection_type_is_not_retried() {
    let device = Arc::new(FakeDevice::new(commands()));
    let host = TestHost::new(FakeFactory::new(device));

    let mut entry = local_entry("Kitchen");
    entry
        .data
        .insert("connection_type".into(), json!("bluetooth"));
    let entry_id = host.setup(entry).await;

    assert_eq!(entry_state(&host, &entry_id), ConfigEntryState::SetupError);
    assert!(!host.hass.services.has_service("cremalink_ha", "brew"));
}

#[tokio::test]
async fn test_unresolvable_map_is_not_retried() {
    let device = Arc::new(FakeDevice::new(commands()));
    let mut factory = FakeFactory::new(device);
    factory.unknown_maps = true;
    let host = TestHost::new(factory);

    let entry_id = host.setup(local_entry("Kitchen")).await;

    assert_eq!(entry_state(&host, &entry_id), ConfigEntryState::SetupError);
}

#[tokio::test]
async fn test_missing_cloud_device_is_retried() {
    let host = TestHost::new(FakeFactory::empty());

    let entry_id = host.setup(cloud_entry("Kitchen")).await;

    let entry = host.hass.config_entries.get(&entry_id).unwrap();
    assert_eq!(entry.state, ConfigEntryState::SetupRetry);
    assert!(entry.reason.unwrap().contains("Could not find cloud device"));
}

#[tokio::test]
async fn test_configure_failure_is_retried() {
    let device = Arc::new(FakeDevice::new(commands()));
    device.fail_configure(DeviceError::Timeout);
    let host = TestHost::new(FakeFactory::new(device));

    let entry_id = host.setup(local_entry("Kitchen")).await;

    assert_eq!(entry_state(&host, &entry_id), ConfigEntryState::SetupRetry);
    assert!(host.integration.entry(&entry_id).await.is_none());
}

#[tokio::test]
async fn test_failed_first_refresh_is_retried() {
    let device = Arc::new(FakeDevice::new(commands()));
    device.push_monitor(Err(DeviceError::Timeout));
    let host = TestHost::new(FakeFactory::new(device));

    let entry_id = host.setup(local_entry("Kitchen")).await;

    assert_eq!(entry_state(&host, &entry_id), ConfigEntryState::SetupRetry);
}

#[tokio::test]
async fn test_failed_properties_refresh_is_retried() {
    let device = Arc::new(FakeDevice::new(commands()));
    device.set_properties(Err(DeviceError::Auth("token expired".into())));
    let host = TestHost::new(FakeFactory::new(device));

    let entry_id = host.setup(cloud_entry("Kitchen")).await;

    assert_eq!(entry_state(&host, &entry_id), ConfigEntryState::SetupRetry);
}

#[tokio::test]
async fn test_brew_service_removed_with_last_entry() {
    let device = Arc::new(FakeDevice::new(commands()));
    device.set_properties(Ok(cloud_properties()));
    let host = TestHost::new(FakeFactory::new(device));

    let first = host.setup(local_entry("Kitchen")).await;
    let second = host.setup(cloud_entry("Office")).await;
    assert_eq!(host.integration.entry_count().await, 2);

    host.hass.config_entries.unload(&first).await.unwrap();
    assert!(host.hass.services.has_service("cremalink_ha", "brew"));
    assert!(host.hass.entities.entity_ids_for_entry(&first).is_empty());

    host.hass.config_entries.unload(&second).await.unwrap();
    assert!(!host.hass.services.has_service("cremalink_ha", "brew"));
    assert_eq!(host.hass.entities.entity_count(), 0);
    assert_eq!(entry_state(&host, &second), ConfigEntryState::NotLoaded);
}

#[tokio::test]
async fn test_unload_stops_coordinators() {
    let device = Arc::new(FakeDevice::new(commands()));
    let host = TestHost::new(FakeFactory::new(device));
    let entry_id = host.setup(local_entry("Kitchen")).await;
    let context = host.integration.entry(&entry_id).await.unwrap();

    host.hass.config_entries.unload(&entry_id).await.unwrap();

    assert!(context.coordinator.is_shutdown());
    assert!(host.hass.states.get_state("sensor.kitchen_status").is_none());
}

#[test]
fn test_entries_belong_to_domain() {
    let entry: ConfigEntry = local_entry("Kitchen");
    assert_eq!(entry.domain, cremalink_ha::DOMAIN);
}
