//! Data update coordinator
//!
//! One coordinator polls one data source on a schedule and shares the
//! latest snapshot with every entity built on it. Entities never poll; they
//! wait on [`DataUpdateCoordinator::subscribe`] and read
//! [`DataUpdateCoordinator::data`] when notified.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{watch, Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::executor::ExecutorError;

/// A poll that did not produce data
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct UpdateFailed(pub String);

impl UpdateFailed {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<ExecutorError> for UpdateFailed {
    fn from(err: ExecutorError) -> Self {
        Self(err.to_string())
    }
}

/// The data source behind a coordinator
#[async_trait]
pub trait DataUpdater: Send + Sync + 'static {
    type Data: Send + Sync + 'static;

    async fn async_update_data(&self) -> Result<Self::Data, UpdateFailed>;

    /// Interval to use after a successful poll returned `data`, `None`
    /// keeps the current one
    fn next_update_interval(&self, _data: &Self::Data) -> Option<Duration> {
        None
    }
}

/// Periodic poller with an atomically replaced snapshot
pub struct DataUpdateCoordinator<U: DataUpdater> {
    name: String,
    updater: U,
    data: watch::Sender<Option<Arc<U::Data>>>,
    /// Bumped after every refresh attempt, successful or not
    generation: watch::Sender<u64>,
    last_update_success: AtomicBool,
    update_interval_ms: AtomicU64,
    refresh_lock: Mutex<()>,
    /// Restarts the poll timer after an out-of-band refresh
    reschedule: Notify,
    cancel: CancellationToken,
}

impl<U: DataUpdater> DataUpdateCoordinator<U> {
    pub fn new(name: impl Into<String>, updater: U, update_interval: Duration) -> Self {
        Self {
            name: name.into(),
            updater,
            data: watch::Sender::new(None),
            generation: watch::Sender::new(0),
            last_update_success: AtomicBool::new(true),
            update_interval_ms: AtomicU64::new(update_interval.as_millis() as u64),
            refresh_lock: Mutex::new(()),
            reschedule: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn updater(&self) -> &U {
        &self.updater
    }

    /// Latest snapshot, `None` until the first successful poll
    pub fn data(&self) -> Option<Arc<U::Data>> {
        self.data.borrow().clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::SeqCst)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.load(Ordering::SeqCst))
    }

    pub fn set_update_interval(&self, interval: Duration) {
        self.update_interval_ms
            .store(interval.as_millis() as u64, Ordering::SeqCst);
    }

    /// Receiver that changes after every refresh attempt
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Poll once and publish the outcome
    ///
    /// On failure the previous snapshot is kept and only
    /// `last_update_success` changes. Listeners are notified either way.
    #[instrument(skip(self), fields(coordinator = %self.name))]
    pub async fn async_refresh(&self) -> Result<(), UpdateFailed> {
        let _guard = self.refresh_lock.lock().await;
        let was_successful = self.last_update_success();

        let result = match self.updater.async_update_data().await {
            Ok(data) => {
                if let Some(interval) = self.updater.next_update_interval(&data) {
                    self.set_update_interval(interval);
                }
                self.data.send_replace(Some(Arc::new(data)));
                self.last_update_success.store(true, Ordering::SeqCst);
                if !was_successful {
                    info!("Fetching {} data recovered", self.name);
                }
                Ok(())
            }
            Err(err) => {
                self.last_update_success.store(false, Ordering::SeqCst);
                if was_successful {
                    warn!("Error fetching {} data: {}", self.name, err);
                } else {
                    debug!("Error fetching {} data: {}", self.name, err);
                }
                Err(err)
            }
        };

        self.generation.send_modify(|g| *g = g.wrapping_add(1));
        result
    }

    /// Ask for a refresh outside the schedule, e.g. after a command
    ///
    /// The next scheduled poll is pushed back a full interval.
    pub async fn async_request_refresh(&self) {
        // Failures are already logged and published to listeners
        let _ = self.async_refresh().await;
        self.reschedule.notify_one();
    }

    /// First refresh during entry setup; the caller turns a failure into a
    /// not-ready setup
    pub async fn async_config_entry_first_refresh(&self) -> Result<(), UpdateFailed> {
        self.async_refresh().await
    }

    /// Start the periodic poll task
    ///
    /// The interval is re-read before every sleep, so a change made by
    /// [`DataUpdater::next_update_interval`] applies to the next wait. A
    /// requested refresh restarts the wait.
    pub fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let delay = this.update_interval();
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = this.reschedule.notified() => continue,
                    () = tokio::time::sleep(delay) => {
                        let _ = this.async_refresh().await;
                    }
                }
            }
            debug!("{} coordinator stopped", this.name);
        });
    }

    /// Stop the periodic poll task
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
