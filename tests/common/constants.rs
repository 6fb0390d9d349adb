//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When test data changes (user handles, catalog IDs, etc.),
//! update only this file.

// ============================================================================
// Test Users
// ============================================================================

/// Handle of the first test user
pub const USER_1_HANDLE: &str = "alice";

/// Id assigned to the first test user on a fresh database
pub const USER_1_ID: i64 = 1;

/// Handle of the second test user
pub const USER_2_HANDLE: &str = "bob";

/// Id assigned to the second test user on a fresh database
pub const USER_2_ID: i64 = 2;

/// Id no test user has
pub const UNKNOWN_USER_ID: i64 = 999;

// ============================================================================
// Test Catalog IDs
// ============================================================================

/// Artist ID for "The Test Band"
pub const ARTIST_1_ID: &str = "artist-1";

/// Artist ID for "Jazz Ensemble"
pub const ARTIST_2_ID: &str = "artist-2";

/// Album ID for "First Album" by The Test Band
pub const ALBUM_1_ID: &str = "album-1";

/// Album ID for "Jazz Collection" by Jazz Ensemble
pub const ALBUM_2_ID: &str = "album-2";

/// Song ID for "Opening Track" on First Album
pub const SONG_A_ID: &str = "song-a";

/// Song ID for "Middle Track" on First Album
pub const SONG_B_ID: &str = "song-b";

/// Song ID for "Smooth Jazz" on Jazz Collection, credited to both artists
pub const SONG_C_ID: &str = "song-c";

// ============================================================================
// Test Catalog Metadata
// ============================================================================

/// Artist 1 name
pub const ARTIST_1_NAME: &str = "The Test Band";

/// Artist 2 name
pub const ARTIST_2_NAME: &str = "Jazz Ensemble";

/// Album 1 title
pub const ALBUM_1_TITLE: &str = "First Album";

/// Album 2 title
pub const ALBUM_2_TITLE: &str = "Jazz Collection";

/// Song A title
pub const SONG_A_TITLE: &str = "Opening Track";

/// Song B title
pub const SONG_B_TITLE: &str = "Middle Track";

/// Song C title
pub const SONG_C_TITLE: &str = "Smooth Jazz";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Maximum time to wait for a manually triggered job (milliseconds)
pub const JOB_COMPLETION_TIMEOUT_MS: u64 = 5000;
