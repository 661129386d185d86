//! Config entry lifecycle rules
//!
//! ```text
//! NotLoaded → SetupInProgress → Loaded
//!                            ↘ SetupError → SetupInProgress (manual retry)
//!                            ↘ SetupRetry → SetupInProgress (scheduled retry)
//!
//! Loaded/SetupError/SetupRetry → UnloadInProgress → NotLoaded
//!                                                 ↘ FailedUnload (terminal)
//! ```

use std::time::Duration;

use crate::entry::ConfigEntryState;
use thiserror::Error;

/// Error when an invalid state transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid state transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
}

impl ConfigEntryState {
    /// Check a transition, returning the target state if it is allowed
    pub fn try_transition(
        self,
        to: ConfigEntryState,
    ) -> Result<ConfigEntryState, InvalidTransition> {
        use ConfigEntryState::*;

        let valid = matches!(
            (self, to),
            (NotLoaded, SetupInProgress)
                | (SetupInProgress, Loaded | SetupError | SetupRetry)
                | (SetupError | SetupRetry, SetupInProgress | UnloadInProgress)
                | (Loaded, UnloadInProgress)
                | (UnloadInProgress, NotLoaded | FailedUnload)
        );

        if valid {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }
}

/// Delay before the next setup attempt of an entry that was not ready
///
/// `2^min(tries, 4) * 5` seconds plus up to 100ms of jitter: 5s, 10s, 20s,
/// 40s, 80s, then 80s from there on.
pub fn calculate_retry_delay(tries: u32) -> Duration {
    let base_secs = 2_u64.pow(tries.min(4)) * 5;
    let jitter_ms = (rand::random::<f64>() * 100.0) as u64;
    Duration::from_secs(base_secs) + Duration::from_millis(jitter_ms)
}
