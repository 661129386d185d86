//! Core types for the Home Assistant host
//!
//! This crate provides the value types shared by the host crates and the
//! integrations running on them: EntityId, State, Context, ServiceCall and
//! the entity metadata types (platform, category, device info).

mod context;
mod entity;
mod entity_id;
mod service_call;
mod state;

pub use context::Context;
pub use entity::{DeviceInfo, EntityCategory, Platform, SensorStateClass};
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use service_call::{ServiceCall, SupportsResponse};
pub use state::State;

/// Maximum length for a state value
pub const MAX_STATE_LENGTH: usize = 255;

/// State value for an entity that exists but has no value yet
pub const STATE_UNKNOWN: &str = "unknown";

/// State value for an entity whose data source is unavailable
pub const STATE_UNAVAILABLE: &str = "unavailable";

pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";

/// Unit for percentage sensors
pub const PERCENTAGE: &str = "%";

/// Standard event payloads
pub mod events {
    use super::*;

    /// Payload broadcast whenever an entity state is written or removed
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }
}
