//! Delegation of the weekly refresh to a storage-native recurring event.
//!
//! Some databases can run the refresh themselves on a schedule. Installing
//! such an event is optional: when the storage layer has no facility or
//! refuses it, the in-process scheduler job drives the refresh instead.

use super::error::RankingError;
use crate::background_jobs::WeeklySchedule;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NativeEventError {
    #[error("recurring events are not supported by {0}")]
    Unsupported(&'static str),

    #[error("not authorized to create recurring events: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Storage(#[from] RankingError),
}

/// Storage-side recurring job facility.
pub trait RecurringEventFacility: Send + Sync {
    fn name(&self) -> &'static str;

    /// Installs (or replaces) the recurring weekly refresh.
    fn install_weekly_refresh(&self, schedule: &WeeklySchedule) -> Result<(), NativeEventError>;
}

/// SQLite has no event scheduler; installation always reports `Unsupported`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteRecurringEvents;

impl RecurringEventFacility for SqliteRecurringEvents {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn install_weekly_refresh(&self, _schedule: &WeeklySchedule) -> Result<(), NativeEventError> {
        Err(NativeEventError::Unsupported(self.name()))
    }
}

/// Who drives the weekly refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDriver {
    /// The storage layer runs it as a recurring event.
    Native(&'static str),
    /// The in-process scheduler runs it as a background job.
    InProcess,
}

/// Tries the native facility first. Any failure is logged and resolves to
/// the in-process driver, it never aborts startup.
pub fn select_refresh_driver(
    facility: &dyn RecurringEventFacility,
    schedule: &WeeklySchedule,
) -> RefreshDriver {
    match facility.install_weekly_refresh(schedule) {
        Ok(()) => {
            info!(
                "Weekly ranking refresh delegated to {} recurring event ({})",
                facility.name(),
                schedule
            );
            RefreshDriver::Native(facility.name())
        }
        Err(NativeEventError::Unsupported(name)) => {
            info!(
                "{} has no recurring events, weekly ranking refresh runs in process ({})",
                name, schedule
            );
            RefreshDriver::InProcess
        }
        Err(e) => {
            warn!(
                "Could not install {} recurring event, falling back to in-process refresh: {}",
                facility.name(),
                e
            );
            RefreshDriver::InProcess
        }
    }
}
