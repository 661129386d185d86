//! Config Entries
//!
//! A config entry is one configured instance of an integration (one coffee
//! machine, one bridge). This crate tracks entries and drives their
//! lifecycle through the integration's [`ConfigEntryHandler`].
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`ConfigEntries`] - Manager for all config entries

pub mod entry;
pub mod manager;
pub mod state_machine;

pub use entry::{ConfigEntry, ConfigEntryState};
pub use manager::{
    ConfigEntries, ConfigEntriesError, ConfigEntriesResult, ConfigEntryHandler, SetupError,
};
pub use state_machine::{calculate_retry_delay, InvalidTransition};
