//! Catalog and rating models.
//!
//! These map one-to-one onto rows of the catalog database, except `Song`
//! which carries its album title and artist names resolved through the link
//! tables.

use serde::{Deserialize, Serialize};

/// Lowest accepted rating value.
pub const MIN_RATING_VALUE: i64 = 1;
/// Highest accepted rating value.
pub const MAX_RATING_VALUE: i64 = 5;

pub fn is_valid_rating_value(value: i64) -> bool {
    (MIN_RATING_VALUE..=MAX_RATING_VALUE).contains(&value)
}

// =============================================================================
// Users
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub handle: String,
    pub email: Option<String>,
    pub created: String,
}

/// User to be created.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub handle: String,
    pub email: Option<String>,
}

// =============================================================================
// Catalog entities
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub release_date: Option<String>,
}

/// Song to be inserted, with its album and artist links.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct NewSong {
    pub id: String,
    pub title: String,
    pub release_date: Option<String>,
    pub album_id: Option<String>,
    pub disc_no: Option<i64>,
    pub track_no: Option<i64>,
    /// Artist ids in credit order.
    #[serde(default)]
    pub artist_ids: Vec<String>,
}

/// Song with resolved album title and artist names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub release_date: Option<String>,
    pub album_id: Option<String>,
    pub album_title: Option<String>,
    pub artists: Vec<String>,
}

// =============================================================================
// Ratings
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub user_id: i64,
    pub song_id: String,
    pub value: i64,
    pub comment: Option<String>,
    /// RFC 3339 UTC timestamp of the last write.
    pub rated_at: String,
}

/// All-time average of a song's ratings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingAverage {
    pub song_id: String,
    pub title: String,
    pub average: f64,
    pub rating_count: i64,
}
