//! SQLite schema definitions for the music catalog database.
//!
//! Songs, artists and albums use the text ids of the imported dataset as
//! primary keys. Ratings reference songs by id without a foreign key so that
//! they survive catalog re-imports; the ranking refresh skips ratings whose
//! song is gone.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

// =============================================================================
// Version 1 - Users and catalog
// =============================================================================

const USERS_TABLE_V1: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("email", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Text,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const ARTISTS_TABLE_V1: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_artists_name", "name")],
    unique_constraints: &[],
};

const ALBUMS_TABLE_V1: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("release_date", &SqlType::Text), // '2023-05-15', may be partial
    ],
    indices: &[("idx_albums_title", "title")],
    unique_constraints: &[],
};

const SONGS_TABLE_V1: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("release_date", &SqlType::Text),
    ],
    indices: &[("idx_songs_title", "title")],
    unique_constraints: &[],
};

const ALBUM_SONGS_TABLE_V1: Table = Table {
    name: "album_songs",
    columns: &[
        sqlite_column!(
            "album_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "albums",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!(
            "song_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "songs",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("disc_no", &SqlType::Integer),
        sqlite_column!("track_no", &SqlType::Integer),
    ],
    indices: &[("idx_album_songs_song", "song_id")],
    unique_constraints: &[&["album_id", "song_id"]],
};

const SONG_ARTISTS_TABLE_V1: Table = Table {
    name: "song_artists",
    columns: &[
        sqlite_column!(
            "song_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "songs",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "artists",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_song_artists_artist", "artist_id")],
    unique_constraints: &[&["song_id", "artist_id"]],
};

// =============================================================================
// Version 2 - Ratings
// =============================================================================

const RATINGS_TABLE_V2: Table = Table {
    name: "ratings",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "users",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("song_id", &SqlType::Text, non_null = true),
        sqlite_column!("value", &SqlType::Integer, non_null = true),
        sqlite_column!("comment", &SqlType::Text),
        sqlite_column!("rated_at", &SqlType::Text, non_null = true), // RFC 3339, UTC
    ],
    indices: &[
        ("idx_ratings_rated_at", "rated_at"),
        ("idx_ratings_song", "song_id"),
    ],
    unique_constraints: &[&["user_id", "song_id"]],
};

fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    RATINGS_TABLE_V2.create(conn)
}

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[
            USERS_TABLE_V1,
            ARTISTS_TABLE_V1,
            ALBUMS_TABLE_V1,
            SONGS_TABLE_V1,
            ALBUM_SONGS_TABLE_V1,
            SONG_ARTISTS_TABLE_V1,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            USERS_TABLE_V1,
            ARTISTS_TABLE_V1,
            ALBUMS_TABLE_V1,
            SONGS_TABLE_V1,
            ALBUM_SONGS_TABLE_V1,
            SONG_ARTISTS_TABLE_V1,
            RATINGS_TABLE_V2,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];
