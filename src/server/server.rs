use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::background_jobs::jobs::WEEKLY_RANKING_JOB_ID;
use crate::background_jobs::JobError;
use crate::catalog_store::{RatingError, SqliteCatalogStore, UserError};
use crate::ranking::{RankingService, WeeklyRanking};
use crate::sqlite_persistence::SqliteDatabase;
use tower_http::services::ServeDir;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::metrics::metrics_handler;
use super::{log_requests, state::*, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct RateSongBody {
    pub uid: i64,
    pub rate_value: i64,
    pub comment: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CreateUserBody {
    pub handle: String,
    pub email: Option<String>,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

async fn health_db(State(database): State<SqliteDatabase>) -> Response {
    let db = database.clone();
    let healthy = tokio::task::spawn_blocking(move || db.ping())
        .await
        .unwrap_or(false);
    if healthy {
        Json(json!({ "db": "ok" })).into_response()
    } else {
        warn!("Database health check failed for {:?}", database.path());
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "db": "down" })),
        )
            .into_response()
    }
}

/// Never fails: the ranking service degrades to the last snapshot or to an
/// empty list.
async fn get_weekly_ranking(State(ranking): State<GuardedRankingService>) -> Response {
    let weekly_ranking = match tokio::task::spawn_blocking(move || ranking.get_weekly_ranking())
        .await
    {
        Ok(weekly_ranking) => weekly_ranking,
        Err(err) => {
            error!("Weekly ranking read task failed: {}", err);
            WeeklyRanking::empty()
        }
    };
    Json(weekly_ranking).into_response()
}

async fn refresh_weekly_ranking(
    State(scheduler_handle): State<OptionalSchedulerHandle>,
) -> Response {
    let Some(handle) = scheduler_handle else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    match handle.trigger_job(WEEKLY_RANKING_JOB_ID).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({ "job_id": WEEKLY_RANKING_JOB_ID })),
        )
            .into_response(),
        Err(JobError::AlreadyRunning) => StatusCode::CONFLICT.into_response(),
        // Not registered when the storage runs the refresh natively
        Err(JobError::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to trigger weekly ranking refresh: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn get_jobs(State(scheduler_handle): State<OptionalSchedulerHandle>) -> Response {
    match scheduler_handle {
        Some(handle) => Json(handle.list_jobs().await).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn get_job(
    State(scheduler_handle): State<OptionalSchedulerHandle>,
    Path(id): Path<String>,
) -> Response {
    let Some(handle) = scheduler_handle else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    match handle.get_job(&id).await {
        Some(job) => Json(job).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn create_user(
    State(catalog_store): State<GuardedCatalogStore>,
    Json(body): Json<CreateUserBody>,
) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let id = catalog_store.create_user(body.handle.trim(), body.email.as_deref())?;
        Ok::<_, UserError>(catalog_store.get_user(id)?)
    })
    .await;

    match result {
        Ok(Ok(Some(user))) => (StatusCode::CREATED, Json(user)).into_response(),
        Ok(Err(err @ UserError::EmptyHandle)) => {
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        Ok(Err(err @ UserError::HandleTaken(_))) => {
            (StatusCode::CONFLICT, err.to_string()).into_response()
        }
        Ok(Ok(None)) => {
            error!("Created user could not be read back");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Ok(Err(err)) => {
            error!("Failed to create user: {:#}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => {
            error!("User creation task failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_user(
    State(catalog_store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Response {
    match tokio::task::spawn_blocking(move || catalog_store.get_user(id)).await {
        Ok(Ok(Some(user))) => Json(user).into_response(),
        Ok(Ok(None)) => StatusCode::NOT_FOUND.into_response(),
        Ok(Err(err)) => {
            error!("Failed to read user {}: {:#}", id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => {
            error!("User read task failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_song(
    State(catalog_store): State<GuardedCatalogStore>,
    Path(id): Path<String>,
) -> Response {
    let song_id = id.clone();
    match tokio::task::spawn_blocking(move || catalog_store.get_song(&song_id)).await {
        Ok(Ok(Some(song))) => Json(song).into_response(),
        Ok(Ok(None)) => StatusCode::NOT_FOUND.into_response(),
        Ok(Err(err)) => {
            error!("Failed to read song {}: {:#}", id, err);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{}", err)).into_response()
        }
        Err(err) => {
            error!("Song read task failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn rate_song(
    State(rating_store): State<GuardedRatingStore>,
    Path(id): Path<String>,
    Json(body): Json<RateSongBody>,
) -> Response {
    let uid = body.uid;
    let song_id = id.clone();
    let result = tokio::task::spawn_blocking(move || {
        rating_store.upsert_rating(body.uid, &song_id, body.rate_value, body.comment.as_deref())
    })
    .await;

    match result {
        Ok(Ok(rating)) => (StatusCode::CREATED, Json(rating)).into_response(),
        Ok(Err(err @ RatingError::InvalidValue(_))) => {
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        Ok(Err(err @ (RatingError::UnknownUser(_) | RatingError::UnknownSong(_)))) => {
            (StatusCode::NOT_FOUND, err.to_string()).into_response()
        }
        Ok(Err(err)) => {
            error!("Failed to store rating of user {} for {}: {}", uid, id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => {
            error!("Rating task failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_rating_averages(State(rating_store): State<GuardedRatingStore>) -> Response {
    match tokio::task::spawn_blocking(move || rating_store.get_rating_averages()).await {
        Ok(Ok(ratings)) => Json(json!({
            "count": ratings.len(),
            "ratings": ratings,
        }))
        .into_response(),
        Ok(Err(err)) => {
            error!("Failed to read rating averages: {:#}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => {
            error!("Rating averages task failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    database: SqliteDatabase,
    catalog_store: Arc<SqliteCatalogStore>,
    ranking: Arc<RankingService>,
    scheduler_handle: OptionalSchedulerHandle,
) -> Result<Router> {
    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        hash: env!("GIT_HASH").to_string(),
        database,
        catalog_store: catalog_store.clone(),
        rating_store: catalog_store,
        ranking,
        scheduler_handle,
    };

    let ranking_routes: Router = Router::new()
        .route("/", get(get_weekly_ranking))
        .route("/refresh", post(refresh_weekly_ranking))
        .with_state(state.clone());

    let jobs_routes: Router = Router::new()
        .route("/", get(get_jobs))
        .route("/{id}", get(get_job))
        .with_state(state.clone());

    let song_routes: Router = Router::new()
        .route("/{id}", get(get_song))
        .route("/{id}/rate", post(rate_song))
        .with_state(state.clone());

    let user_routes: Router = Router::new()
        .route("/", post(create_user))
        .route("/{id}", get(get_user))
        .with_state(state.clone());

    let rating_routes: Router = Router::new()
        .route("/average", get(get_rating_averages))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .route("/health/db", get(health_db).with_state(state.clone()))
        .nest("/v1/weekly-ranking", ranking_routes)
        .nest("/v1/jobs", jobs_routes)
        .nest("/v1/users", user_routes)
        .nest("/v1/songs", song_routes)
        .nest("/v1/ratings", rating_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_server(
    config: ServerConfig,
    database: SqliteDatabase,
    catalog_store: Arc<SqliteCatalogStore>,
    ranking: Arc<RankingService>,
    scheduler_handle: OptionalSchedulerHandle,
) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, database, catalog_store, ranking, scheduler_handle)?;

    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, make_metrics_app()).await {
            error!("Metrics server stopped: {}", err);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on {}", listener.local_addr()?);

    Ok(axum::serve(listener, app).await?)
}
