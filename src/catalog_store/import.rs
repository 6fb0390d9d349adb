//! Catalog file import.
//!
//! A catalog file is a JSON document with four optional lists:
//!
//! ```json
//! {
//!   "users":   [{ "handle": "alice", "email": "alice@example.com" }],
//!   "artists": [{ "id": "art-1", "name": "Artist" }],
//!   "albums":  [{ "id": "alb-1", "title": "Album", "release_date": "2024-01-05" }],
//!   "songs":   [{ "id": "song-1", "title": "Song", "album_id": "alb-1",
//!                 "disc_no": 1, "track_no": 1, "artist_ids": ["art-1"] }]
//! }
//! ```
//!
//! Artists and albums go in before the songs that link to them. Rows are
//! inserted, never replaced, so importing into a populated database reports
//! the existing ids as errors.

use super::models::{Album, Artist, NewSong, NewUser};
use super::trait_def::CatalogStore;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt::Display;
use std::path::Path;
use tracing::{error, info};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogFile {
    pub users: Vec<NewUser>,
    pub artists: Vec<Artist>,
    pub albums: Vec<Album>,
    pub songs: Vec<NewSong>,
}

impl CatalogFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse catalog file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub users_imported: usize,
    pub artists_imported: usize,
    pub albums_imported: usize,
    pub songs_imported: usize,
    pub errors: usize,
}

/// Imports every entry of `catalog` into `store`.
///
/// With `continue_on_error` a failed entry is logged and counted, otherwise
/// the first failure aborts the import. Entries imported before the failure
/// stay in the store.
pub fn import_catalog(
    store: &dyn CatalogStore,
    catalog: &CatalogFile,
    continue_on_error: bool,
) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    info!("Importing {} artist(s)...", catalog.artists.len());
    for artist in &catalog.artists {
        if record(
            store.insert_artist(artist),
            "artist",
            &artist.id,
            continue_on_error,
            &mut stats,
        )? {
            stats.artists_imported += 1;
        }
    }

    info!("Importing {} album(s)...", catalog.albums.len());
    for album in &catalog.albums {
        if record(
            store.insert_album(album),
            "album",
            &album.id,
            continue_on_error,
            &mut stats,
        )? {
            stats.albums_imported += 1;
        }
    }

    info!("Importing {} song(s)...", catalog.songs.len());
    for song in &catalog.songs {
        if record(
            store.insert_song(song),
            "song",
            &song.id,
            continue_on_error,
            &mut stats,
        )? {
            stats.songs_imported += 1;
        }
    }

    info!("Importing {} user(s)...", catalog.users.len());
    for user in &catalog.users {
        let result = store
            .create_user(&user.handle, user.email.as_deref())
            .map_err(anyhow::Error::from);
        if record(result, "user", &user.handle, continue_on_error, &mut stats)? {
            stats.users_imported += 1;
        }
    }

    Ok(stats)
}

/// `Ok(true)` when the entry went in, `Ok(false)` when its failure was
/// skipped.
fn record<T, K: Display>(
    result: Result<T>,
    entity: &str,
    key: K,
    continue_on_error: bool,
    stats: &mut ImportStats,
) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(err) => {
            error!("Failed to import {} {}: {:#}", entity, key, err);
            stats.errors += 1;
            if continue_on_error {
                Ok(false)
            } else {
                Err(err.context(format!("Failed to import {} {}", entity, key)))
            }
        }
    }
}
