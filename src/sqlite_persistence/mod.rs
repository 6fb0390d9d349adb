mod database;
mod versioned_schema;

pub use database::{SqliteDatabase, DEFAULT_BUSY_TIMEOUT};
pub use versioned_schema::{
    apply_versioned_schemas, read_schema_version, Column, ForeignKey, ForeignKeyOnChange, SqlType,
    Table, VersionedSchema, BASE_DB_VERSION, DEFAULT_TIMESTAMP,
};
