//! Reads the published weekly ranking snapshot.

use super::builder::{SNAPSHOT_META_TABLE, SNAPSHOT_TABLE};
use super::error::RankingError;
use super::week::{format_week_start, parse_week_start, WeekWindow};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;

/// What is currently published, independent of the current week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotState {
    /// No refresh ever completed.
    Absent,
    Present(SnapshotInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub week_start: NaiveDate,
    pub refreshed_at: String,
    pub row_count: usize,
    pub skipped_ratings: usize,
}

/// Snapshot state relative to the week being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotAvailability {
    Absent,
    Stale,
    Fresh,
}

impl SnapshotState {
    pub fn availability(&self, current_week: NaiveDate) -> SnapshotAvailability {
        match self {
            SnapshotState::Absent => SnapshotAvailability::Absent,
            SnapshotState::Present(info) if info.week_start == current_week => {
                SnapshotAvailability::Fresh
            }
            SnapshotState::Present(_) => SnapshotAvailability::Stale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSong {
    pub song_id: String,
    pub score: f64,
    pub rank: i64,
    pub rating_count: i64,
    pub week_start: String,
    pub title: Option<String>,
    pub album_title: Option<String>,
    pub artists: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyRanking {
    pub count: usize,
    pub rankings: Vec<RankedSong>,
    pub availability: SnapshotAvailability,
    pub week_start: Option<String>,
}

impl WeeklyRanking {
    pub fn empty() -> Self {
        Self {
            count: 0,
            rankings: Vec::new(),
            availability: SnapshotAvailability::Absent,
            week_start: None,
        }
    }
}

fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Tells an absent snapshot apart from a published one, empty or not.
/// Artist names of every ranked song, in credit order.
fn read_ranked_artists(conn: &Connection) -> rusqlite::Result<HashMap<String, Vec<String>>> {
    let mut stmt = conn.prepare(
        "SELECT sa.song_id, ar.name
         FROM weekly_ranking_snapshot r
         JOIN song_artists sa ON sa.song_id = r.song_id
         JOIN artists ar ON ar.id = sa.artist_id
         ORDER BY sa.song_id, sa.position",
    )?;
    let mut artists: HashMap<String, Vec<String>> = HashMap::new();
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (song_id, name) = row?;
        artists.entry(song_id).or_default().push(name);
    }
    Ok(artists)
}

pub fn inspect_snapshot(conn: &Connection) -> Result<SnapshotState, RankingError> {
    if !table_exists(conn, SNAPSHOT_TABLE)? || !table_exists(conn, SNAPSHOT_META_TABLE)? {
        return Ok(SnapshotState::Absent);
    }

    let meta = conn
        .query_row(
            "SELECT week_start, refreshed_at, skipped_ratings
             FROM weekly_ranking_snapshot_meta WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;
    let Some((week_start, refreshed_at, skipped_ratings)) = meta else {
        return Ok(SnapshotState::Absent);
    };
    let Some(week_start) = parse_week_start(&week_start) else {
        return Err(RankingError::Storage(format!(
            "invalid snapshot week start '{}'",
            week_start
        )));
    };

    let row_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM weekly_ranking_snapshot", [], |row| {
            row.get(0)
        })?;

    Ok(SnapshotState::Present(SnapshotInfo {
        week_start,
        refreshed_at,
        row_count: row_count as usize,
        skipped_ratings: skipped_ratings as usize,
    }))
}

#[derive(Debug, Clone, Copy)]
pub struct RankingReader {
    utc_offset: FixedOffset,
}

impl RankingReader {
    pub fn new(utc_offset: FixedOffset) -> Self {
        Self { utc_offset }
    }

    /// Reads the published snapshot in stored rank order, with song metadata.
    /// An absent snapshot reads as an empty ranking.
    pub fn read(
        &self,
        conn: &Connection,
        now: DateTime<Utc>,
    ) -> Result<WeeklyRanking, RankingError> {
        // One read transaction so metadata and rows come from the same commit.
        let tx = conn.unchecked_transaction()?;
        let conn: &Connection = &tx;
        let state = inspect_snapshot(conn)?;
        let current_week = WeekWindow::containing(now, self.utc_offset).week_start();
        let availability = state.availability(current_week);
        let SnapshotState::Present(info) = state else {
            return Ok(WeeklyRanking::empty());
        };

        // Songs removed after the refresh keep their row without metadata.
        let mut stmt = conn.prepare(
            "SELECT r.song_id, r.aggregate_score, r.rank, r.rating_count, r.week_start,
                    s.title, a.title
             FROM weekly_ranking_snapshot r
             LEFT JOIN songs s ON s.id = r.song_id
             LEFT JOIN album_songs als ON als.rowid = (
                 SELECT MIN(rowid) FROM album_songs WHERE song_id = r.song_id
             )
             LEFT JOIN albums a ON a.id = als.album_id
             ORDER BY r.rank ASC",
        )?;
        let mut rankings = stmt
            .query_map([], |row| {
                Ok(RankedSong {
                    song_id: row.get(0)?,
                    score: row.get(1)?,
                    rank: row.get(2)?,
                    rating_count: row.get(3)?,
                    week_start: row.get(4)?,
                    title: row.get(5)?,
                    album_title: row.get(6)?,
                    artists: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut artists = read_ranked_artists(conn)?;
        for ranked in &mut rankings {
            if let Some(names) = artists.remove(&ranked.song_id) {
                ranked.artists = names;
            }
        }

        Ok(WeeklyRanking {
            count: rankings.len(),
            rankings,
            availability,
            week_start: Some(format_week_start(info.week_start)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{Album, Artist, CatalogStore, NewSong, RatingStore};
    use crate::ranking::builder::tests::{create_tmp_catalog, utc};
    use crate::ranking::builder::SnapshotBuilder;

    fn utc_offset() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn missing_tables_read_as_absent() {
        let (store, _temp_dir) = create_tmp_catalog(&[]);
        let conn = store.database().connection().unwrap();

        assert_eq!(inspect_snapshot(&conn).unwrap(), SnapshotState::Absent);
        let ranking = RankingReader::new(utc_offset())
            .read(&conn, utc(2026, 10, 20, 10))
            .unwrap();
        assert_eq!(ranking, WeeklyRanking::empty());
    }

    #[test]
    fn empty_snapshot_is_present() {
        let (store, _temp_dir) = create_tmp_catalog(&[]);
        let mut conn = store.database().connection().unwrap();
        let now = utc(2026, 10, 20, 10);
        SnapshotBuilder::new(utc_offset()).refresh(&mut conn, now).unwrap();

        let SnapshotState::Present(info) = inspect_snapshot(&conn).unwrap() else {
            panic!("snapshot should be present");
        };
        assert_eq!(info.row_count, 0);
        assert_eq!(info.refreshed_at, "2026-10-20T10:00:00Z");

        let ranking = RankingReader::new(utc_offset()).read(&conn, now).unwrap();
        assert_eq!(ranking.count, 0);
        assert_eq!(ranking.availability, SnapshotAvailability::Fresh);
        assert_eq!(ranking.week_start.as_deref(), Some("2026-10-19"));
    }

    #[test]
    fn snapshot_turns_stale_after_week_boundary() {
        let (store, _temp_dir) = create_tmp_catalog(&["a"]);
        let u1 = store.create_user("u1", None).unwrap();
        let now = utc(2026, 10, 20, 10);
        store.upsert_rating_at(u1, "a", 3, None, now).unwrap();
        let mut conn = store.database().connection().unwrap();
        SnapshotBuilder::new(utc_offset()).refresh(&mut conn, now).unwrap();

        let reader = RankingReader::new(utc_offset());
        assert_eq!(
            reader.read(&conn, utc(2026, 10, 25, 23)).unwrap().availability,
            SnapshotAvailability::Fresh
        );
        let next_week = reader.read(&conn, utc(2026, 10, 26, 0)).unwrap();
        assert_eq!(next_week.availability, SnapshotAvailability::Stale);
        assert_eq!(next_week.count, 1);
        assert_eq!(next_week.rankings[0].week_start, "2026-10-19");
    }

    #[test]
    fn rows_carry_song_metadata() {
        let (store, _temp_dir) = create_tmp_catalog(&[]);
        store
            .insert_artist(&Artist {
                id: "ar1".to_string(),
                name: "Artist".to_string(),
            })
            .unwrap();
        store
            .insert_album(&Album {
                id: "al1".to_string(),
                title: "Album".to_string(),
                release_date: None,
            })
            .unwrap();
        store
            .insert_song(&NewSong {
                id: "s1".to_string(),
                title: "Song".to_string(),
                album_id: Some("al1".to_string()),
                artist_ids: vec!["ar1".to_string()],
                ..Default::default()
            })
            .unwrap();
        let u1 = store.create_user("u1", None).unwrap();
        let now = utc(2026, 10, 20, 10);
        store.upsert_rating_at(u1, "s1", 5, None, now).unwrap();

        let mut conn = store.database().connection().unwrap();
        SnapshotBuilder::new(utc_offset()).refresh(&mut conn, now).unwrap();
        let ranking = RankingReader::new(utc_offset()).read(&conn, now).unwrap();

        assert_eq!(
            ranking.rankings,
            vec![RankedSong {
                song_id: "s1".to_string(),
                score: 5.0,
                rank: 1,
                rating_count: 1,
                week_start: "2026-10-19".to_string(),
                title: Some("Song".to_string()),
                album_title: Some("Album".to_string()),
                artists: vec!["Artist".to_string()],
            }]
        );
    }

    #[test]
    fn removed_songs_keep_their_row_without_metadata() {
        let (store, _temp_dir) = create_tmp_catalog(&[]);
        for (id, name) in [("ar1", "First"), ("ar2", "Second")] {
            store
                .insert_artist(&Artist {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .unwrap();
        }
        store
            .insert_song(&NewSong {
                id: "duet".to_string(),
                title: "Duet".to_string(),
                artist_ids: vec!["ar2".to_string(), "ar1".to_string()],
                ..Default::default()
            })
            .unwrap();
        store
            .insert_song(&NewSong {
                id: "gone".to_string(),
                title: "Gone".to_string(),
                artist_ids: vec!["ar1".to_string()],
                ..Default::default()
            })
            .unwrap();
        let u1 = store.create_user("u1", None).unwrap();
        let now = utc(2026, 10, 20, 10);
        store.upsert_rating_at(u1, "duet", 4, None, now).unwrap();
        store.upsert_rating_at(u1, "gone", 5, None, now).unwrap();

        let mut conn = store.database().connection().unwrap();
        SnapshotBuilder::new(utc_offset()).refresh(&mut conn, now).unwrap();
        conn.execute("DELETE FROM songs WHERE id = 'gone'", []).unwrap();
        let ranking = RankingReader::new(utc_offset()).read(&conn, now).unwrap();

        assert_eq!(ranking.count, 2);
        let gone = &ranking.rankings[0];
        assert_eq!((gone.song_id.as_str(), gone.rank), ("gone", 1));
        assert_eq!(gone.title, None);
        assert_eq!(gone.album_title, None);
        assert!(gone.artists.is_empty());

        let duet = &ranking.rankings[1];
        assert_eq!(duet.title.as_deref(), Some("Duet"));
        assert_eq!(duet.album_title, None);
        assert_eq!(duet.artists, vec!["Second", "First"]);
    }
}
