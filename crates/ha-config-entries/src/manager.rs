//! Config Entries Manager
//!
//! Owns all config entries and drives setup/unload through the handler
//! registered for each entry's domain.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState};
use crate::state_machine::{calculate_retry_delay, InvalidTransition};

/// Outcome of a failed setup, as reported by an integration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetupError {
    /// Transient; the entry goes to `SetupRetry` and is tried again later
    #[error("not ready: {0}")]
    NotReady(String),

    /// Permanent until the entry is reloaded by hand
    #[error("{0}")]
    Failed(String),
}

/// Integration hooks for setting up and unloading one config entry
#[async_trait]
pub trait ConfigEntryHandler: Send + Sync + 'static {
    async fn async_setup_entry(&self, entry: &ConfigEntry) -> Result<(), SetupError>;

    /// Returns `false` when the integration could not release the entry
    async fn async_unload_entry(&self, entry: &ConfigEntry) -> bool;
}

#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("no handler registered for domain {0}")]
    NoHandler(String),

    #[error("cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("setup failed: {0}")]
    SetupFailed(String),

    #[error("setup not ready, retry scheduled: {0}")]
    NotReady(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config Entries Manager
pub struct ConfigEntries {
    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> entry_ids in insertion order
    by_domain: DashMap<String, Vec<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    handlers: DashMap<String, Arc<dyn ConfigEntryHandler>>,

    /// Pending setup retries by entry_id
    retries: DashMap<String, JoinHandle<()>>,
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            handlers: DashMap::new(),
            retries: DashMap::new(),
        }
    }

    /// Register the setup/unload handler for a domain
    pub fn register_handler(&self, domain: &str, handler: Arc<dyn ConfigEntryHandler>) {
        self.handlers.insert(domain.to_string(), handler);
        debug!("Registered config entry handler for domain: {}", domain);
    }

    /// Add a new config entry
    pub fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            let key = (entry.domain.clone(), unique_id.clone());
            if self.by_unique_id.contains_key(&key) {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
            self.by_unique_id.insert(key, entry.entry_id.clone());
        }

        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .push(entry.entry_id.clone());
        self.entries.insert(entry.entry_id.clone(), entry.clone());

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    /// Remove an entry, unloading it first if needed
    pub async fn remove(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self.require(entry_id)?;
        if entry.state != ConfigEntryState::NotLoaded {
            self.unload(entry_id).await?;
        }

        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.retain(|id| id != entry_id);
        }
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }
        let (_, removed) = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        info!("Removed config entry: {} [{}]", removed.title, entry_id);
        Ok(removed)
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    pub fn entry_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.by_domain
            .iter()
            .flat_map(|r| r.value().clone())
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn require(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        self.get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))
    }

    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(())
    }

    /// Set up an entry through its domain handler
    ///
    /// A handler answering [`SetupError::NotReady`] puts the entry in
    /// `SetupRetry` and schedules another attempt with exponential back-off.
    pub async fn setup(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<()> {
        let entry = self.require(entry_id)?;
        let lock = entry.setup_lock.clone();
        let _guard = lock.lock().await;

        // Re-read under the lock; a concurrent unload may have run
        let entry = self.require(entry_id)?;
        if entry.disabled {
            debug!("Skipping setup for disabled entry: {}", entry_id);
            return Ok(());
        }

        let handler = self
            .handlers
            .get(&entry.domain)
            .map(|h| h.value().clone())
            .ok_or_else(|| ConfigEntriesError::NoHandler(entry.domain.clone()))?;

        self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;
        let entry = self.require(entry_id)?;

        match handler.async_setup_entry(&entry).await {
            Ok(()) => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Err(SetupError::NotReady(reason)) => {
                self.transition(
                    entry_id,
                    ConfigEntryState::SetupRetry,
                    Some(reason.clone()),
                )?;
                let tries = self
                    .entries
                    .get_mut(entry_id)
                    .map(|mut e| e.increment_tries())
                    .unwrap_or(1);
                self.schedule_retry(entry_id, tries);
                Err(ConfigEntriesError::NotReady(reason))
            }
            Err(SetupError::Failed(reason)) => {
                warn!("Setup failed for entry {}: {}", entry_id, reason);
                self.transition(
                    entry_id,
                    ConfigEntryState::SetupError,
                    Some(reason.clone()),
                )?;
                Err(ConfigEntriesError::SetupFailed(reason))
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>, entry_id: &str, tries: u32) {
        let delay = calculate_retry_delay(tries - 1);
        warn!(
            "Entry {} not ready, retrying setup in {:.1}s (attempt {})",
            entry_id,
            delay.as_secs_f64(),
            tries
        );

        let this = Arc::clone(self);
        let id = entry_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.retries.remove(&id);
            // The outcome of the retry is reflected in the entry state
            let _ = this.setup(&id).await;
        });

        if let Some(previous) = self.retries.insert(entry_id.to_string(), handle) {
            previous.abort();
        }
    }

    /// Unload an entry
    pub async fn unload(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<()> {
        if let Some((_, pending)) = self.retries.remove(entry_id) {
            pending.abort();
        }

        let entry = self.require(entry_id)?;
        let lock = entry.setup_lock.clone();
        let _guard = lock.lock().await;

        let entry = self.require(entry_id)?;
        match entry.state {
            ConfigEntryState::NotLoaded => return Ok(()),
            state if !state.is_recoverable() => {
                return Err(ConfigEntriesError::CannotUnload(state));
            }
            _ => {}
        }

        let was_loaded = entry.is_loaded();
        self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        let unload_ok = if was_loaded {
            match self.handlers.get(&entry.domain).map(|h| h.value().clone()) {
                Some(handler) => handler.async_unload_entry(&entry).await,
                None => true,
            }
        } else {
            true
        };

        if unload_ok {
            self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
            info!("Unloaded entry: {} ({})", entry.title, entry_id);
            Ok(())
        } else {
            self.transition(
                entry_id,
                ConfigEntryState::FailedUnload,
                Some("integration refused to unload".to_string()),
            )?;
            Err(ConfigEntriesError::CannotUnload(ConfigEntryState::FailedUnload))
        }
    }

    /// Unload every entry, used at shutdown
    pub async fn unload_all(self: &Arc<Self>) {
        for entry_id in self.entry_ids() {
            if let Err(e) = self.unload(&entry_id).await {
                warn!("Failed to unload entry {}: {}", entry_id, e);
            }
        }
    }
}

impl Default for ConfigEntries {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Handler that is not ready for the first `not_ready` attempts
    struct FlakyHandler {
        not_ready: u32,
        attempts: AtomicU32,
        unloads: AtomicU32,
    }

    impl FlakyHandler {
        fn new(not_ready: u32) -> Arc<Self> {
            Arc::new(Self {
                not_ready,
                attempts: AtomicU32::new(0),
                unloads: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ConfigEntryHandler for FlakyHandler {
        async fn async_setup_entry(&self, _entry: &ConfigEntry) -> Result<(), SetupError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.not_ready {
                Err(SetupError::NotReady("device offline".into()))
            } else {
                Ok(())
            }
        }

        async fn async_unload_entry(&self, _entry: &ConfigEntry) -> bool {
            self.unloads.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl ConfigEntryHandler for FailingHandler {
        async fn async_setup_entry(&self, _entry: &ConfigEntry) -> Result<(), SetupError> {
            Err(SetupError::Failed("unknown connection type".into()))
        }

        async fn async_unload_entry(&self, _entry: &ConfigEntry) -> bool {
            true
        }
    }

    fn manager() -> Arc<ConfigEntries> {
        Arc::new(ConfigEntries::new())
    }

    #[tokio::test]
    async fn test_duplicate_unique_id_rejected() {
        let manager = manager();
        manager
            .add(ConfigEntry::new("cremalink_ha", "A").with_unique_id("dsn-1"))
            .unwrap();
        let result = manager.add(ConfigEntry::new("cremalink_ha", "B").with_unique_id("dsn-1"));

        assert!(matches!(
            result,
            Err(ConfigEntriesError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_setup_and_unload() {
        let manager = manager();
        let handler = FlakyHandler::new(0);
        manager.register_handler("cremalink_ha", handler.clone());

        let entry = manager.add(ConfigEntry::new("cremalink_ha", "Kitchen")).unwrap();
        manager.setup(&entry.entry_id).await.unwrap();
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
        assert_eq!(manager.entry_ids(), vec![entry.entry_id.clone()]);

        manager.unload(&entry.entry_id).await.unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_setup_failure_is_not_retried() {
        let manager = manager();
        manager.register_handler("cremalink_ha", Arc::new(FailingHandler));

        let entry = manager.add(ConfigEntry::new("cremalink_ha", "Kitchen")).unwrap();
        let result = manager.setup(&entry.entry_id).await;

        assert!(matches!(result, Err(ConfigEntriesError::SetupFailed(_))));
        let stored = manager.get(&entry.entry_id).unwrap();
        assert_eq!(stored.state, ConfigEntryState::SetupError);
        assert_eq!(stored.reason.as_deref(), Some("unknown connection type"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_retries_until_loaded() {
        let manager = manager();
        let handler = FlakyHandler::new(2);
        manager.register_handler("cremalink_ha", handler.clone());

        let entry = manager.add(ConfigEntry::new("cremalink_ha", "Kitchen")).unwrap();
        let result = manager.setup(&entry.entry_id).await;
        assert!(matches!(result, Err(ConfigEntriesError::NotReady(_))));
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::SetupRetry
        );

        // 5s then 10s of back-off, plus jitter
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(handler.attempts.load(Ordering::SeqCst), 3);
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unload_cancels_pending_retry() {
        let manager = manager();
        let handler = FlakyHandler::new(1);
        manager.register_handler("cremalink_ha", handler.clone());

        let entry = manager.add(ConfigEntry::new("cremalink_ha", "Kitchen")).unwrap();
        let _ = manager.setup(&entry.entry_id).await;
        manager.unload(&entry.entry_id).await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(handler.attempts.load(Ordering::SeqCst), 1);
        // Never loaded, so the integration had nothing to release
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_handler() {
        let manager = manager();
        let entry = manager.add(ConfigEntry::new("unknown", "X")).unwrap();
        assert!(matches!(
            manager.setup(&entry.entry_id).await,
            Err(ConfigEntriesError::NoHandler(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_unloads_first() {
        let manager = manager();
        let handler = FlakyHandler::new(0);
        manager.register_handler("cremalink_ha", handler.clone());

        let entry = manager
            .add(ConfigEntry::new("cremalink_ha", "Kitchen").with_unique_id("dsn-1"))
            .unwrap();
        manager.setup(&entry.entry_id).await.unwrap();
        manager.remove(&entry.entry_id).await.unwrap();

        assert!(manager.is_empty());
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 1);
        // unique_id is free again
        manager
            .add(ConfigEntry::new("cremalink_ha", "Again").with_unique_id("dsn-1"))
            .unwrap();
    }
}
