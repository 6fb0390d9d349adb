//! SQLite-backed catalog and rating store.
//!
//! Every call opens its own connection from the shared `SqliteDatabase`, so
//! the store is cheap to clone and safe to use from the blocking pool.

use super::models::*;
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::trait_def::{CatalogStore, RatingError, RatingStore, UserError};
use crate::sqlite_persistence::{apply_versioned_schemas, SqliteDatabase};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

/// Formats an instant the way timestamps are stored in the database.
pub fn to_db_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Reads a song with its first album title and its artist names in credit
/// order, on the given connection.
fn read_song(conn: &Connection, id: &str) -> rusqlite::Result<Option<Song>> {
    let song = conn
        .query_row(
            "SELECT s.id, s.title, s.release_date, a.id, a.title
             FROM songs s
             LEFT JOIN album_songs als ON als.rowid = (
                 SELECT MIN(rowid) FROM album_songs WHERE song_id = s.id
             )
             LEFT JOIN albums a ON a.id = als.album_id
             WHERE s.id = ?1",
            params![id],
            |row| {
                Ok(Song {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    release_date: row.get(2)?,
                    album_id: row.get(3)?,
                    album_title: row.get(4)?,
                    artists: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut song) = song else {
        return Ok(None);
    };

    let mut stmt = conn.prepare_cached(
        "SELECT ar.name FROM song_artists sa
         JOIN artists ar ON ar.id = sa.artist_id
         WHERE sa.song_id = ?1
         ORDER BY sa.position",
    )?;
    song.artists = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(Some(song))
}

fn parse_rating_row(row: &rusqlite::Row) -> rusqlite::Result<Rating> {
    Ok(Rating {
        id: row.get(0)?,
        user_id: row.get(1)?,
        song_id: row.get(2)?,
        value: row.get(3)?,
        comment: row.get(4)?,
        rated_at: row.get(5)?,
    })
}

#[derive(Clone)]
pub struct SqliteCatalogStore {
    db: SqliteDatabase,
}

impl SqliteCatalogStore {
    /// Opens the store, creating or migrating the catalog schema.
    pub fn new(db: SqliteDatabase) -> Result<Self> {
        let mut conn = db
            .connection()
            .with_context(|| format!("Failed to open catalog db at {:?}", db.path()))?;
        apply_versioned_schemas(&mut conn, CATALOG_VERSIONED_SCHEMAS)
            .context("Failed to apply catalog schema")?;
        info!("Catalog store ready at {:?}", db.path());
        Ok(Self { db })
    }

    pub fn database(&self) -> &SqliteDatabase {
        &self.db
    }

    fn conn(&self) -> Result<Connection> {
        Ok(self.db.connection()?)
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn create_user(
        &self,
        handle: &str,
        email: Option<&str>,
    ) -> std::result::Result<i64, UserError> {
        if handle.trim().is_empty() {
            return Err(UserError::EmptyHandle);
        }
        let conn = self.conn()?;
        match conn.execute(
            "INSERT INTO users (handle, email) VALUES (?1, ?2)",
            params![handle, email],
        ) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(UserError::HandleTaken(handle.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, handle, email, created FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        handle: row.get(1)?,
                        email: row.get(2)?,
                        created: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn insert_artist(&self, artist: &Artist) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO artists (id, name) VALUES (?1, ?2)",
            params![artist.id, artist.name],
        )?;
        Ok(())
    }

    fn insert_album(&self, album: &Album) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO albums (id, title, release_date) VALUES (?1, ?2, ?3)",
            params![album.id, album.title, album.release_date],
        )?;
        Ok(())
    }

    fn insert_song(&self, song: &NewSong) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO songs (id, title, release_date) VALUES (?1, ?2, ?3)",
            params![song.id, song.title, song.release_date],
        )?;
        if let Some(album_id) = &song.album_id {
            tx.execute(
                "INSERT INTO album_songs (album_id, song_id, disc_no, track_no)
                 VALUES (?1, ?2, ?3, ?4)",
                params![album_id, song.id, song.disc_no, song.track_no],
            )
            .with_context(|| format!("Failed to link song {} to album {}", song.id, album_id))?;
        }
        for (position, artist_id) in song.artist_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO song_artists (song_id, artist_id, position) VALUES (?1, ?2, ?3)",
                params![song.id, artist_id, position as i64],
            )
            .with_context(|| format!("Failed to link song {} to artist {}", song.id, artist_id))?;
        }
        tx.commit()?;
        debug!("Inserted song {}", song.id);
        Ok(())
    }

    fn get_song(&self, id: &str) -> Result<Option<Song>> {
        let conn = self.conn()?;
        Ok(read_song(&conn, id)?)
    }

    fn get_songs_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl RatingStore for SqliteCatalogStore {
    fn upsert_rating_at(
        &self,
        user_id: i64,
        song_id: &str,
        value: i64,
        comment: Option<&str>,
        rated_at: DateTime<Utc>,
    ) -> std::result::Result<Rating, RatingError> {
        if !is_valid_rating_value(value) {
            return Err(RatingError::InvalidValue(value));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let user_exists = tx
            .query_row("SELECT 1 FROM users WHERE id = ?1", params![user_id], |_| {
                Ok(())
            })
            .optional()?
            .is_some();
        if !user_exists {
            return Err(RatingError::UnknownUser(user_id));
        }
        let song_exists = tx
            .query_row("SELECT 1 FROM songs WHERE id = ?1", params![song_id], |_| {
                Ok(())
            })
            .optional()?
            .is_some();
        if !song_exists {
            return Err(RatingError::UnknownSong(song_id.to_string()));
        }

        let rating = tx.query_row(
            "INSERT INTO ratings (user_id, song_id, value, comment, rated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, song_id) DO UPDATE SET
                 value = excluded.value,
                 comment = excluded.comment,
                 rated_at = excluded.rated_at
             RETURNING id, user_id, song_id, value, comment, rated_at",
            params![user_id, song_id, value, comment, to_db_timestamp(rated_at)],
            parse_rating_row,
        )?;
        tx.commit()?;

        debug!(
            "User {} rated song {} with {}",
            rating.user_id, rating.song_id, rating.value
        );
        Ok(rating)
    }

    fn get_user_rating(&self, user_id: i64, song_id: &str) -> Result<Option<Rating>> {
        let conn = self.conn()?;
        let rating = conn
            .query_row(
                "SELECT id, user_id, song_id, value, comment, rated_at
                 FROM ratings WHERE user_id = ?1 AND song_id = ?2",
                params![user_id, song_id],
                parse_rating_row,
            )
            .optional()?;
        Ok(rating)
    }

    fn get_rating_averages(&self) -> Result<Vec<RatingAverage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT r.song_id, s.title, AVG(r.value) AS average, COUNT(*) AS rating_count
             FROM ratings r
             JOIN songs s ON s.id = r.song_id
             GROUP BY r.song_id
             ORDER BY average DESC, rating_count DESC, r.song_id ASC",
        )?;
        let averages = stmt
            .query_map([], |row| {
                Ok(RatingAverage {
                    song_id: row.get(0)?,
                    title: row.get(1)?,
                    average: row.get(2)?,
                    rating_count: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(averages)
    }
}
