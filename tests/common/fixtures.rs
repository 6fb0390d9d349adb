//! Test fixture creation for the catalog database

use super::constants::*;
use anyhow::{ensure, Result};
use songrank_server::catalog_store::{Album, Artist, CatalogStore, NewSong, SqliteCatalogStore};
use songrank_server::sqlite_persistence::{SqliteDatabase, DEFAULT_BUSY_TIMEOUT};
use tempfile::TempDir;

/// Creates a temporary catalog with 2 artists, 2 albums, 3 songs and 2 users.
/// Returns (temp_dir, database, store)
pub fn create_test_catalog() -> Result<(TempDir, SqliteDatabase, SqliteCatalogStore)> {
    let dir = TempDir::new()?;

    let database = SqliteDatabase::open(dir.path().join("catalog.db"), DEFAULT_BUSY_TIMEOUT)?;
    let store = SqliteCatalogStore::new(database.clone())?;

    store.insert_artist(&Artist {
        id: ARTIST_1_ID.to_string(),
        name: ARTIST_1_NAME.to_string(),
    })?;
    store.insert_artist(&Artist {
        id: ARTIST_2_ID.to_string(),
        name: ARTIST_2_NAME.to_string(),
    })?;

    store.insert_album(&Album {
        id: ALBUM_1_ID.to_string(),
        title: ALBUM_1_TITLE.to_string(),
        release_date: Some("2023-01-15".to_string()),
    })?;
    store.insert_album(&Album {
        id: ALBUM_2_ID.to_string(),
        title: ALBUM_2_TITLE.to_string(),
        release_date: Some("2023-06-20".to_string()),
    })?;

    store.insert_song(&NewSong {
        id: SONG_A_ID.to_string(),
        title: SONG_A_TITLE.to_string(),
        album_id: Some(ALBUM_1_ID.to_string()),
        disc_no: Some(1),
        track_no: Some(1),
        artist_ids: vec![ARTIST_1_ID.to_string()],
        ..Default::default()
    })?;
    store.insert_song(&NewSong {
        id: SONG_B_ID.to_string(),
        title: SONG_B_TITLE.to_string(),
        album_id: Some(ALBUM_1_ID.to_string()),
        disc_no: Some(1),
        track_no: Some(2),
        artist_ids: vec![ARTIST_1_ID.to_string()],
        ..Default::default()
    })?;
    store.insert_song(&NewSong {
        id: SONG_C_ID.to_string(),
        title: SONG_C_TITLE.to_string(),
        album_id: Some(ALBUM_2_ID.to_string()),
        disc_no: Some(1),
        track_no: Some(1),
        artist_ids: vec![ARTIST_2_ID.to_string(), ARTIST_1_ID.to_string()],
        ..Default::default()
    })?;

    let user_1 = store.create_user(USER_1_HANDLE, Some("alice@example.com"))?;
    let user_2 = store.create_user(USER_2_HANDLE, None)?;
    ensure!(user_1 == USER_1_ID, "unexpected id {} for {}", user_1, USER_1_HANDLE);
    ensure!(user_2 == USER_2_ID, "unexpected id {} for {}", user_2, USER_2_HANDLE);

    Ok((dir, database, store))
}
