//! Weekly song ranking.
//!
//! Ratings of the current week are aggregated into a snapshot table that is
//! rebuilt as a whole, on a weekly schedule, at startup and before reads.
//! Readers are served the last published snapshot when a rebuild fails.

mod builder;
mod error;
mod native_events;
mod reader;
mod service;
mod week;

pub use builder::{SnapshotBuilder, SNAPSHOT_META_TABLE, SNAPSHOT_TABLE};
pub use error::{RankingError, RankingErrorKind, RefreshOutcome, RefreshReport};
pub use native_events::{
    select_refresh_driver, NativeEventError, RecurringEventFacility, RefreshDriver,
    SqliteRecurringEvents,
};
pub use reader::{
    inspect_snapshot, RankedSong, RankingReader, SnapshotAvailability, SnapshotInfo,
    SnapshotState, WeeklyRanking,
};
pub use service::{RankingService, RefreshTrigger};
pub use week::{format_week_start, WeekWindow};
