//! Store traits for the catalog and the ratings.

use super::models::*;
use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Trait for catalog storage backends.
pub trait CatalogStore: Send + Sync {
    // =========================================================================
    // Users
    // =========================================================================

    /// Creates a user and returns its id. Handles are unique.
    fn create_user(&self, handle: &str, email: Option<&str>)
        -> std::result::Result<i64, UserError>;

    fn get_user(&self, id: i64) -> Result<Option<User>>;

    // =========================================================================
    // Catalog
    // =========================================================================

    fn insert_artist(&self, artist: &Artist) -> Result<()>;

    fn insert_album(&self, album: &Album) -> Result<()>;

    /// Inserts a song together with its album and artist links.
    fn insert_song(&self, song: &NewSong) -> Result<()>;

    /// Get a song with its album title and artist names.
    fn get_song(&self, id: &str) -> Result<Option<Song>>;

    fn get_songs_count(&self) -> Result<usize>;
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user handle must not be empty")]
    EmptyHandle,

    #[error("user handle {0} is already taken")]
    HandleTaken(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("rating value {0} is outside the accepted range")]
    InvalidValue(i64),

    #[error("user {0} not found")]
    UnknownUser(i64),

    #[error("song {0} not found")]
    UnknownSong(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Durable store of user ratings. One rating per (user, song); a repeated
/// rating overwrites the previous one.
pub trait RatingStore: Send + Sync {
    /// Inserts or updates the rating of `user_id` for `song_id`, stamped with
    /// the current time.
    fn upsert_rating(
        &self,
        user_id: i64,
        song_id: &str,
        value: i64,
        comment: Option<&str>,
    ) -> std::result::Result<Rating, RatingError> {
        self.upsert_rating_at(user_id, song_id, value, comment, Utc::now())
    }

    fn upsert_rating_at(
        &self,
        user_id: i64,
        song_id: &str,
        value: i64,
        comment: Option<&str>,
        rated_at: DateTime<Utc>,
    ) -> std::result::Result<Rating, RatingError>;

    fn get_user_rating(&self, user_id: i64, song_id: &str) -> Result<Option<Rating>>;

    /// All-time rating averages, best first.
    fn get_rating_averages(&self) -> Result<Vec<RatingAverage>>;
}
