//! Catalog Import Tool
//!
//! Seeds the catalog database of a songrank server from a JSON catalog file
//! (users, artists, albums, songs). The database and its schema are created
//! when missing.

use anyhow::{bail, Result};
use clap::Parser;
use songrank_server::catalog_store::{import_catalog, CatalogFile, CatalogStore, SqliteCatalogStore};
use songrank_server::config::CATALOG_DB_FILE_NAME;
use songrank_server::sqlite_persistence::{SqliteDatabase, DEFAULT_BUSY_TIMEOUT};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "songrank-import")]
#[command(about = "Import a JSON catalog file into the songrank database")]
struct Args {
    /// Path to the JSON catalog file
    #[arg(value_name = "CATALOG_FILE")]
    catalog_file: PathBuf,

    /// Directory of the catalog database, the same one the server uses as --db-dir
    #[arg(value_name = "DB_DIR")]
    db_dir: PathBuf,

    /// Skip entries that fail to import instead of stopping at the first one
    #[arg(long, default_value_t = false)]
    continue_on_error: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if !args.db_dir.is_dir() {
        bail!("Database directory does not exist: {}", args.db_dir.display());
    }
    let db_path = args.db_dir.join(CATALOG_DB_FILE_NAME);

    info!("Catalog Import Tool");
    info!("===================");
    info!("Catalog file: {}", args.catalog_file.display());
    info!("Database: {}", db_path.display());

    if db_path.exists() {
        warn!("Database already exists: {}", db_path.display());
        warn!("Entries whose id or handle is already present will fail.");
    }

    let catalog = CatalogFile::load(&args.catalog_file)?;
    info!(
        "Loaded catalog: {} users, {} artists, {} albums, {} songs",
        catalog.users.len(),
        catalog.artists.len(),
        catalog.albums.len(),
        catalog.songs.len()
    );

    let database = SqliteDatabase::open(&db_path, DEFAULT_BUSY_TIMEOUT)?;
    let store = SqliteCatalogStore::new(database)?;

    let stats = import_catalog(&store, &catalog, args.continue_on_error)?;

    info!("");
    info!("Import Summary");
    info!("==============");
    info!("Users imported: {}", stats.users_imported);
    info!("Artists imported: {}", stats.artists_imported);
    info!("Albums imported: {}", stats.albums_imported);
    info!("Songs imported: {}", stats.songs_imported);
    if stats.errors > 0 {
        warn!("Errors encountered: {}", stats.errors);
    }
    info!("Database contains {} song(s)", store.get_songs_count()?);

    Ok(())
}
