//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own catalog database.

use super::constants::*;
use super::fixtures::create_test_catalog;
use chrono::{FixedOffset, Weekday};
use songrank_server::background_jobs::jobs::WeeklyRankingJob;
use songrank_server::background_jobs::{create_scheduler, JobContext, WeeklySchedule};
use songrank_server::catalog_store::SqliteCatalogStore;
use songrank_server::ranking::RankingService;
use songrank_server::server::{server::make_app, RequestsLoggingLevel, ServerConfig};
use songrank_server::sqlite_persistence::{SqliteDatabase, DEFAULT_BUSY_TIMEOUT};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with an isolated catalog database
///
/// When dropped, the server and its scheduler shut down and temp resources
/// are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Catalog store for direct database access in tests
    pub catalog_store: Arc<SqliteCatalogStore>,

    /// Ranking service sharing the server's database
    pub ranking: Arc<RankingService>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    scheduler_shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns a new test server on a random port, with a scheduler running
    /// the weekly ranking job
    pub async fn spawn() -> Self {
        Self::spawn_with(true).await
    }

    /// Spawns a new test server without a job scheduler
    pub async fn spawn_without_scheduler() -> Self {
        Self::spawn_with(false).await
    }

    /// Spawns a test server, with scheduler, over the catalog database
    /// already present in `db_dir` (created when missing)
    pub async fn spawn_from_dir(db_dir: TempDir) -> Self {
        let database = SqliteDatabase::open(db_dir.path().join("catalog.db"), DEFAULT_BUSY_TIMEOUT)
            .expect("Failed to open catalog database");
        let store = SqliteCatalogStore::new(database.clone()).expect("Failed to open catalog");
        Self::start(db_dir, database, store, true).await
    }

    /// This function:
    /// 1. Creates a temporary catalog with test data
    /// 2. Optionally starts a scheduler with the weekly ranking job
    /// 3. Binds to a random port (127.0.0.1:0)
    /// 4. Spawns the server in a background task
    /// 5. Waits for the server to be ready
    ///
    /// # Panics
    ///
    /// Panics if catalog creation, port binding or server startup fails.
    async fn spawn_with(with_scheduler: bool) -> Self {
        let (temp_db_dir, database, store) =
            create_test_catalog().expect("Failed to create test catalog");
        Self::start(temp_db_dir, database, store, with_scheduler).await
    }

    async fn start(
        temp_db_dir: TempDir,
        database: SqliteDatabase,
        store: SqliteCatalogStore,
        with_scheduler: bool,
    ) -> Self {
        let catalog_store = Arc::new(store);

        let utc = FixedOffset::east_opt(0).expect("Invalid offset");
        let ranking = Arc::new(RankingService::new(database.clone(), utc));

        let scheduler_shutdown = CancellationToken::new();
        let scheduler_handle = if with_scheduler {
            let job_context = JobContext::new(scheduler_shutdown.child_token(), ranking.clone());
            let (mut scheduler, handle) =
                create_scheduler(scheduler_shutdown.clone(), job_context);
            let schedule =
                WeeklySchedule::new(Weekday::Mon, 0, 5, utc).expect("Invalid weekly schedule");
            scheduler
                .register_job(Arc::new(WeeklyRankingJob::new(schedule)))
                .await;
            tokio::spawn(async move {
                scheduler.run().await;
            });
            Some(handle)
        } else {
            None
        };

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        };

        let app = make_app(
            config,
            database,
            catalog_store.clone(),
            ranking.clone(),
            scheduler_handle,
        )
        .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            catalog_store,
            ranking,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
            scheduler_shutdown,
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    // Server is ready
                    return;
                }
                _ => {
                    // Server not ready yet, wait and retry
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.scheduler_shutdown.cancel();
        // TempDir will be cleaned up automatically
    }
}
