//! Songrank Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod background_jobs;
pub mod catalog_store;
pub mod config;
pub mod ranking;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use catalog_store::{CatalogStore, RatingStore, SqliteCatalogStore};
pub use ranking::RankingService;
pub use server::{run_server, RequestsLoggingLevel};
