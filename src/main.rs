use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import modules from the library crate
use songrank_server::background_jobs::jobs::WeeklyRankingJob;
use songrank_server::background_jobs::{create_scheduler, JobContext};
use songrank_server::catalog_store::{CatalogStore, SqliteCatalogStore};
use songrank_server::config;
use songrank_server::ranking::{
    select_refresh_driver, RankingService, RefreshDriver, RefreshTrigger, SqliteRecurringEvents,
};
use songrank_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use songrank_server::sqlite_persistence::SqliteDatabase;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the catalog database (catalog.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// How long a database connection waits on a locked database, in milliseconds.
    #[clap(long, default_value_t = 5000)]
    pub busy_timeout_ms: u64,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            busy_timeout_ms: args.busy_timeout_ms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  port: {}", app_config.port);
    info!("  weekly ranking refresh: {}", app_config.weekly_ranking);

    // Create catalog store (will create DB if not exists)
    if !app_config.catalog_db_path().exists() {
        info!(
            "Creating new catalog database at {:?}",
            app_config.catalog_db_path()
        );
    }
    let database = SqliteDatabase::open(app_config.catalog_db_path(), app_config.busy_timeout)?;
    let catalog_store = Arc::new(SqliteCatalogStore::new(database.clone())?);

    // Initialize metrics system
    info!("Initializing metrics...");
    metrics::init_metrics();
    info!("Catalog has {} song(s)", catalog_store.get_songs_count()?);

    let ranking = Arc::new(RankingService::new(
        database.clone(),
        app_config.weekly_ranking.utc_offset(),
    ));

    // Publish a snapshot for the current week before serving. The outcome is
    // logged by the service; a failure leaves the previous snapshot in place.
    let startup_ranking = ranking.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || {
        startup_ranking.refresh_snapshot(RefreshTrigger::Startup)
    })
    .await
    {
        error!("Startup ranking refresh task failed: {}", e);
    }

    // Set up background job scheduler
    let shutdown_token = CancellationToken::new();

    let job_context = JobContext::new(shutdown_token.child_token(), ranking.clone());
    let (mut scheduler, scheduler_handle) =
        create_scheduler(shutdown_token.clone(), job_context);

    match select_refresh_driver(&SqliteRecurringEvents, &app_config.weekly_ranking) {
        RefreshDriver::InProcess => {
            scheduler
                .register_job(Arc::new(WeeklyRankingJob::new(app_config.weekly_ranking)))
                .await;
        }
        RefreshDriver::Native(facility) => {
            info!("Weekly ranking refresh is run by {}", facility);
        }
    }

    info!(
        "Job scheduler initialized with {} job(s)",
        scheduler.job_count().await
    );

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
    };

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    // Run HTTP server and job scheduler concurrently
    tokio::select! {
        result = run_server(
            server_config,
            database,
            catalog_store,
            ranking,
            Some(scheduler_handle),
        ) => {
            info!("HTTP server stopped: {:?}", result);
            shutdown_token.cancel();
            result
        },
        _ = scheduler.run() => {
            info!("Scheduler stopped");
            Ok(())
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            // Give the scheduler a moment to shut down gracefully
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        }
    }
}
