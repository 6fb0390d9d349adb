use axum::extract::FromRef;

use crate::background_jobs::SchedulerHandle;
use crate::catalog_store::{CatalogStore, RatingStore};
use crate::ranking::RankingService;
use crate::sqlite_persistence::SqliteDatabase;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedCatalogStore = Arc<dyn CatalogStore>;
pub type GuardedRatingStore = Arc<dyn RatingStore>;
pub type GuardedRankingService = Arc<RankingService>;
pub type OptionalSchedulerHandle = Option<SchedulerHandle>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub database: SqliteDatabase,
    pub catalog_store: GuardedCatalogStore,
    pub rating_store: GuardedRatingStore,
    pub ranking: GuardedRankingService,
    pub scheduler_handle: OptionalSchedulerHandle,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for SqliteDatabase {
    fn from_ref(input: &ServerState) -> Self {
        input.database.clone()
    }
}

impl FromRef<ServerState> for GuardedCatalogStore {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog_store.clone()
    }
}

impl FromRef<ServerState> for GuardedRatingStore {
    fn from_ref(input: &ServerState) -> Self {
        input.rating_store.clone()
    }
}

impl FromRef<ServerState> for GuardedRankingService {
    fn from_ref(input: &ServerState) -> Self {
        input.ranking.clone()
    }
}

impl FromRef<ServerState> for OptionalSchedulerHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.scheduler_handle.clone()
    }
}
