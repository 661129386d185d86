//! Helpers shared by integrations
//!
//! - [`DataUpdateCoordinator`] - scheduled polling with a shared snapshot
//! - [`async_add_executor_job`] - run blocking device calls off the async workers
//! - [`Entity`] / [`EntityManager`] - entity model and state writing
//! - [`HomeAssistant`] - the host bundle passed to integrations

pub mod entity;
pub mod entity_manager;
pub mod executor;
pub mod hass;
pub mod update_coordinator;

pub use entity::{Entity, EntityAction, EntityError, EntityInfo};
pub use entity_manager::EntityManager;
pub use executor::{async_add_executor_job, ExecutorError};
pub use hass::{HomeAssistant, HostConfig};
pub use update_coordinator::{DataUpdateCoordinator, DataUpdater, UpdateFailed};
