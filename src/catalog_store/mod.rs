mod import;
mod models;
mod schema;
mod store;
mod trait_def;

pub use import::{import_catalog, CatalogFile, ImportStats};
pub use models::*;
pub use schema::CATALOG_VERSIONED_SCHEMAS;
pub use store::{to_db_timestamp, SqliteCatalogStore};
pub use trait_def::{CatalogStore, RatingError, RatingStore, UserError};
