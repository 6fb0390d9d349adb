//! Entry points of the weekly ranking subsystem.
//!
//! `RankingService` is the edge where refresh failures stop: every non-ok
//! outcome is logged here with the trigger and the time, and callers only get
//! structured values back.

use super::builder::SnapshotBuilder;
use super::error::{RankingError, RefreshOutcome};
use super::reader::{
    inspect_snapshot, RankingReader, SnapshotAvailability, SnapshotState, WeeklyRanking,
};
use super::week::WeekWindow;
use crate::server::metrics;
use crate::sqlite_persistence::SqliteDatabase;
use chrono::{DateTime, FixedOffset, Utc};
use std::time::Instant;
use tracing::{error, info, warn};

/// What caused a refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Startup,
    Scheduled,
    Manual,
    Read,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTrigger::Startup => "startup",
            RefreshTrigger::Scheduled => "scheduled",
            RefreshTrigger::Manual => "manual",
            RefreshTrigger::Read => "read",
        }
    }
}

#[derive(Clone)]
pub struct RankingService {
    db: SqliteDatabase,
    utc_offset: FixedOffset,
}

impl RankingService {
    pub fn new(db: SqliteDatabase, utc_offset: FixedOffset) -> Self {
        Self { db, utc_offset }
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    pub fn refresh_snapshot(&self, trigger: RefreshTrigger) -> RefreshOutcome {
        self.refresh_snapshot_at(trigger, Utc::now())
    }

    /// Rebuilds the snapshot for the week containing `now`. Never fails: the
    /// outcome is logged and returned.
    pub fn refresh_snapshot_at(
        &self,
        trigger: RefreshTrigger,
        now: DateTime<Utc>,
    ) -> RefreshOutcome {
        let start = Instant::now();
        let result = self
            .db
            .connection()
            .map_err(RankingError::from)
            .and_then(|mut conn| SnapshotBuilder::new(self.utc_offset).refresh(&mut conn, now));
        let outcome = RefreshOutcome::from(result);
        let elapsed = start.elapsed();

        metrics::record_ranking_refresh(trigger.as_str(), outcome.label(), elapsed);
        match &outcome {
            RefreshOutcome::Ok(report) => {
                metrics::set_ranking_snapshot_rows(report.ranked_songs);
                info!(
                    "Weekly ranking refreshed ({}) for week {}: {} songs, {} skipped ratings in {:?}",
                    trigger.as_str(),
                    report.week_start,
                    report.ranked_songs,
                    report.skipped_ratings,
                    elapsed
                );
            }
            RefreshOutcome::Recoverable(kind, message) => {
                warn!(
                    "Weekly ranking refresh ({}) at {} failed with {}: {}",
                    trigger.as_str(),
                    now.to_rfc3339(),
                    kind,
                    message
                );
            }
            RefreshOutcome::Fatal(kind, message) => {
                error!(
                    "Weekly ranking refresh ({}) at {} failed with {}: {}",
                    trigger.as_str(),
                    now.to_rfc3339(),
                    kind,
                    message
                );
            }
        }
        outcome
    }

    pub fn get_weekly_ranking(&self) -> WeeklyRanking {
        self.get_weekly_ranking_at(Utc::now())
    }

    /// Attempts one refresh, then serves whatever snapshot is published. Read
    /// failures degrade to an empty ranking.
    pub fn get_weekly_ranking_at(&self, now: DateTime<Utc>) -> WeeklyRanking {
        self.refresh_snapshot_at(RefreshTrigger::Read, now);

        let result = self
            .db
            .connection()
            .map_err(RankingError::from)
            .and_then(|conn| RankingReader::new(self.utc_offset).read(&conn, now));
        match result {
            Ok(ranking) => ranking,
            Err(e) => {
                error!(
                    "Failed to read weekly ranking at {} ({}): {}",
                    now.to_rfc3339(),
                    e.kind(),
                    e
                );
                WeeklyRanking::empty()
            }
        }
    }

    /// Snapshot availability for the week containing `now`, without refreshing.
    pub fn availability_at(&self, now: DateTime<Utc>) -> SnapshotAvailability {
        let current_week = WeekWindow::containing(now, self.utc_offset).week_start();
        match self
            .db
            .connection()
            .map_err(RankingError::from)
            .and_then(|conn| inspect_snapshot(&conn))
        {
            Ok(state) => state.availability(current_week),
            Err(e) => {
                warn!("Failed to inspect weekly ranking snapshot: {}", e);
                SnapshotState::Absent.availability(current_week)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{CatalogStore, RatingStore};
    use crate::ranking::builder::tests::{create_tmp_catalog, utc};
    use crate::ranking::error::RankingErrorKind;
    use crate::sqlite_persistence::DEFAULT_BUSY_TIMEOUT;

    fn service_for(store: &crate::catalog_store::SqliteCatalogStore) -> RankingService {
        RankingService::new(store.database().clone(), FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn cold_start_reads_empty() {
        let (store, _temp_dir) = create_tmp_catalog(&[]);
        let service = service_for(&store);
        let now = utc(2026, 10, 20, 10);

        assert_eq!(service.availability_at(now), SnapshotAvailability::Absent);
        let ranking = service.get_weekly_ranking_at(now);
        assert_eq!(ranking.count, 0);
        assert!(ranking.rankings.is_empty());
        assert_eq!(ranking.availability, SnapshotAvailability::Fresh);
    }

    #[test]
    fn cold_start_without_ratings_table_reads_absent() {
        let (store, _temp_dir) = create_tmp_catalog(&[]);
        let conn = store.database().connection().unwrap();
        conn.execute("DROP TABLE ratings", []).unwrap();
        let service = service_for(&store);
        let now = utc(2026, 10, 20, 10);

        let outcome = service.refresh_snapshot_at(RefreshTrigger::Startup, now);
        assert!(matches!(
            outcome,
            RefreshOutcome::Recoverable(RankingErrorKind::SchemaMissing, _)
        ));
        assert_eq!(service.get_weekly_ranking_at(now), WeeklyRanking::empty());
    }

    #[test]
    fn stale_snapshot_is_served_when_refresh_fails() {
        let (store, _temp_dir) = create_tmp_catalog(&["a", "b"]);
        let u1 = store.create_user("u1", None).unwrap();
        let last_week = utc(2026, 10, 14, 10);
        store.upsert_rating_at(u1, "a", 5, None, last_week).unwrap();
        store.upsert_rating_at(u1, "b", 2, None, last_week).unwrap();

        let service = service_for(&store);
        assert!(service
            .refresh_snapshot_at(RefreshTrigger::Scheduled, last_week)
            .is_ok());

        let conn = store.database().connection().unwrap();
        conn.execute("DROP TABLE ratings", []).unwrap();

        let now = utc(2026, 10, 20, 10);
        let ranking = service.get_weekly_ranking_at(now);
        assert_eq!(ranking.availability, SnapshotAvailability::Stale);
        assert_eq!(ranking.count, 2);
        assert_eq!(ranking.week_start.as_deref(), Some("2026-10-12"));
        let ids: Vec<&str> = ranking.rankings.iter().map(|r| r.song_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn read_refreshes_stale_snapshot() {
        let (store, _temp_dir) = create_tmp_catalog(&["a", "b"]);
        let u1 = store.create_user("u1", None).unwrap();
        let service = service_for(&store);
        store
            .upsert_rating_at(u1, "a", 5, None, utc(2026, 10, 14, 10))
            .unwrap();
        service.refresh_snapshot_at(RefreshTrigger::Scheduled, utc(2026, 10, 14, 10));

        let now = utc(2026, 10, 20, 10);
        store.upsert_rating_at(u1, "b", 3, None, now).unwrap();
        assert_eq!(service.availability_at(now), SnapshotAvailability::Stale);

        let ranking = service.get_weekly_ranking_at(now);
        assert_eq!(ranking.availability, SnapshotAvailability::Fresh);
        assert_eq!(ranking.count, 1);
        assert_eq!(ranking.rankings[0].song_id, "b");
    }

    #[test]
    fn end_to_end_tie_keeps_order_across_refreshes() {
        let (store, _temp_dir) = create_tmp_catalog(&["song_a", "song_b"]);
        let u1 = store.create_user("u1", None).unwrap();
        let u2 = store.create_user("u2", None).unwrap();
        let now = utc(2026, 10, 20, 10);
        store.upsert_rating_at(u1, "song_a", 5, None, now).unwrap();
        store.upsert_rating_at(u2, "song_a", 3, None, now).unwrap();
        store.upsert_rating_at(u1, "song_b", 4, None, now).unwrap();

        let service = service_for(&store);
        for _ in 0..3 {
            let ranking = service.get_weekly_ranking_at(now);
            let rows: Vec<(&str, f64, i64)> = ranking
                .rankings
                .iter()
                .map(|r| (r.song_id.as_str(), r.score, r.rank))
                .collect();
            assert_eq!(rows, vec![("song_a", 4.0, 1), ("song_b", 4.0, 2)]);
        }
    }

    #[test]
    fn unopenable_database_degrades_to_empty() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db = SqliteDatabase::open(temp_dir.path().join("gone.db"), DEFAULT_BUSY_TIMEOUT)
            .unwrap();
        drop(temp_dir);
        let service = RankingService::new(db, FixedOffset::east_opt(0).unwrap());

        let outcome = service.refresh_snapshot_at(RefreshTrigger::Manual, utc(2026, 10, 20, 10));
        assert!(!outcome.is_ok());
        assert_eq!(
            service.get_weekly_ranking_at(utc(2026, 10, 20, 10)),
            WeeklyRanking::empty()
        );
    }
}
