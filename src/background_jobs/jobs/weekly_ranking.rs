//! Weekly ranking refresh job.
//!
//! Rebuilds the weekly ranking snapshot at the configured weekly instant. A
//! failed refresh leaves the previous snapshot in place and is reported as a
//! failed run; the next occurrence is scheduled either way.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior},
    WeeklySchedule,
};
use crate::ranking::{RefreshOutcome, RefreshTrigger};

pub const WEEKLY_RANKING_JOB_ID: &str = "weekly_ranking_refresh";

pub struct WeeklyRankingJob {
    schedule: WeeklySchedule,
}

impl WeeklyRankingJob {
    pub fn new(schedule: WeeklySchedule) -> Self {
        Self { schedule }
    }
}

impl BackgroundJob for WeeklyRankingJob {
    fn id(&self) -> &'static str {
        WEEKLY_RANKING_JOB_ID
    }

    fn name(&self) -> &'static str {
        "Weekly Ranking Refresh"
    }

    fn description(&self) -> &'static str {
        "Recompute the weekly song ranking snapshot from this week's ratings"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Weekly(self.schedule)
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::WaitForCompletion
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        match ctx.ranking.refresh_snapshot(RefreshTrigger::Scheduled) {
            RefreshOutcome::Ok(_) => Ok(()),
            RefreshOutcome::Recoverable(kind, message) | RefreshOutcome::Fatal(kind, message) => {
                Err(JobError::ExecutionFailed(format!("{}: {}", kind, message)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{CatalogStore, NewSong, RatingStore, SqliteCatalogStore};
    use crate::ranking::{RankingService, SnapshotAvailability};
    use crate::sqlite_persistence::{SqliteDatabase, DEFAULT_BUSY_TIMEOUT};
    use chrono::{FixedOffset, Utc, Weekday};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn setup() -> (SqliteCatalogStore, JobContext, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = SqliteDatabase::open(temp_dir.path().join("jobs.db"), DEFAULT_BUSY_TIMEOUT)
            .unwrap();
        let store = SqliteCatalogStore::new(db.clone()).unwrap();
        let ranking = Arc::new(RankingService::new(db, FixedOffset::east_opt(0).unwrap()));
        let ctx = JobContext::new(CancellationToken::new(), ranking);
        (store, ctx, temp_dir)
    }

    fn job() -> WeeklyRankingJob {
        WeeklyRankingJob::new(
            WeeklySchedule::new(Weekday::Mon, 0, 5, FixedOffset::east_opt(0).unwrap()).unwrap(),
        )
    }

    #[test]
    fn test_job_metadata() {
        let job = job();
        assert_eq!(job.id(), "weekly_ranking_refresh");
        assert!(matches!(job.schedule(), JobSchedule::Weekly(_)));
        assert_eq!(job.shutdown_behavior(), ShutdownBehavior::WaitForCompletion);
    }

    #[test]
    fn test_execute_publishes_snapshot() {
        let (store, ctx, _temp_dir) = setup();
        store
            .insert_song(&NewSong {
                id: "s1".to_string(),
                title: "Song".to_string(),
                ..Default::default()
            })
            .unwrap();
        let user_id = store.create_user("u1", None).unwrap();
        store.upsert_rating(user_id, "s1", 4, None).unwrap();

        job().execute(&ctx).unwrap();

        assert_eq!(
            ctx.ranking.availability_at(Utc::now()),
            SnapshotAvailability::Fresh
        );
    }

    #[test]
    fn test_execute_reports_failure() {
        let (store, ctx, _temp_dir) = setup();
        store
            .database()
            .connection()
            .unwrap()
            .execute("DROP TABLE ratings", [])
            .unwrap();

        let result = job().execute(&ctx);
        assert!(matches!(
            result,
            Err(JobError::ExecutionFailed(msg)) if msg.starts_with("schema_missing")
        ));
    }

    #[test]
    fn test_cancelled_job_does_not_run() {
        let (_store, ctx, _temp_dir) = setup();
        ctx.cancellation_token.cancel();
        assert!(matches!(job().execute(&ctx), Err(JobError::Cancelled)));
        assert_eq!(
            ctx.ranking.availability_at(Utc::now()),
            SnapshotAvailability::Absent
        );
    }
}
