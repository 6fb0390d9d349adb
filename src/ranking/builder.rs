//! Weekly ranking snapshot builder.
//!
//! A rebuild runs inside one `IMMEDIATE` transaction: the snapshot tables are
//! created if needed, emptied and refilled, and the commit publishes the new
//! snapshot in one step. If anything fails the transaction rolls back and the
//! previous snapshot stays untouched.

use super::error::{RankingError, RefreshReport};
use super::week::{format_week_start, WeekWindow};
use crate::catalog_store::{to_db_timestamp, MAX_RATING_VALUE, MIN_RATING_VALUE};
use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::{params, Connection, TransactionBehavior};
use tracing::{debug, warn};

pub const SNAPSHOT_TABLE: &str = "weekly_ranking_snapshot";
pub const SNAPSHOT_META_TABLE: &str = "weekly_ranking_snapshot_meta";

const CREATE_SNAPSHOT_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS weekly_ranking_snapshot (
    song_id TEXT PRIMARY KEY,
    aggregate_score REAL NOT NULL,
    rating_count INTEGER NOT NULL,
    rank INTEGER NOT NULL UNIQUE,
    week_start TEXT NOT NULL
)";

// Single row describing the published snapshot, present even when the
// snapshot has no rows.
const CREATE_SNAPSHOT_META_TABLE_SQL: &str =
    "CREATE TABLE IF NOT EXISTS weekly_ranking_snapshot_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    week_start TEXT NOT NULL,
    refreshed_at TEXT NOT NULL,
    ranked_songs INTEGER NOT NULL,
    skipped_ratings INTEGER NOT NULL
)";

const COUNT_SKIPPED_SQL: &str = "SELECT COUNT(*) FROM ratings r
    WHERE r.rated_at >= ?1 AND r.rated_at < ?2
      AND (r.value NOT BETWEEN ?3 AND ?4
           OR NOT EXISTS (SELECT 1 FROM songs s WHERE s.id = r.song_id))";

const INSERT_RANKED_SQL: &str = "INSERT INTO weekly_ranking_snapshot
        (song_id, aggregate_score, rating_count, rank, week_start)
    SELECT song_id, score, rating_count,
           ROW_NUMBER() OVER (ORDER BY score DESC, rating_count DESC, song_id ASC),
           ?5
    FROM (
        SELECT r.song_id AS song_id, AVG(r.value) AS score, COUNT(*) AS rating_count
        FROM ratings r
        JOIN songs s ON s.id = r.song_id
        WHERE r.rated_at >= ?1 AND r.rated_at < ?2
          AND r.value BETWEEN ?3 AND ?4
        GROUP BY r.song_id
    )";

#[derive(Debug, Clone, Copy)]
pub struct SnapshotBuilder {
    utc_offset: FixedOffset,
}

impl SnapshotBuilder {
    pub fn new(utc_offset: FixedOffset) -> Self {
        Self { utc_offset }
    }

    /// Rebuilds the snapshot for the week containing `now`.
    pub fn refresh(
        &self,
        conn: &mut Connection,
        now: DateTime<Utc>,
    ) -> Result<RefreshReport, RankingError> {
        let window = WeekWindow::containing(now, self.utc_offset);
        let (window_start, window_end) = window.db_bounds();
        let week_start = format_week_start(window.week_start());

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(CREATE_SNAPSHOT_TABLE_SQL, [])?;
        tx.execute(CREATE_SNAPSHOT_META_TABLE_SQL, [])?;

        let skipped: i64 = tx.query_row(
            COUNT_SKIPPED_SQL,
            params![window_start, window_end, MIN_RATING_VALUE, MAX_RATING_VALUE],
            |row| row.get(0),
        )?;
        if skipped > 0 {
            warn!(
                "Skipping {} ratings of week {} with unknown song or out of range value",
                skipped, week_start
            );
        }

        tx.execute("DELETE FROM weekly_ranking_snapshot", [])?;
        let ranked = tx.execute(
            INSERT_RANKED_SQL,
            params![
                window_start,
                window_end,
                MIN_RATING_VALUE,
                MAX_RATING_VALUE,
                week_start
            ],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO weekly_ranking_snapshot_meta
                (id, week_start, refreshed_at, ranked_songs, skipped_ratings)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![week_start, to_db_timestamp(now), ranked as i64, skipped],
        )?;
        tx.commit()?;

        debug!("Ranked {} songs for week {}", ranked, week_start);
        Ok(RefreshReport {
            week_start: window.week_start(),
            ranked_songs: ranked,
            skipped_ratings: skipped as usize,
            refreshed_at: now,
        })
    }
}
