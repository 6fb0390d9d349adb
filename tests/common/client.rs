//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all songrank-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// HTTP test client
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap_or_else(|e| panic!("GET {} failed: {}", path, e))
    }

    // ========================================================================
    // Server Endpoints
    // ========================================================================

    /// GET /
    pub async fn get_home(&self) -> Response {
        self.get("/").await
    }

    /// GET /health/db
    pub async fn get_db_health(&self) -> Response {
        self.get("/health/db").await
    }

    // ========================================================================
    // Weekly Ranking Endpoints
    // ========================================================================

    /// GET /v1/weekly-ranking
    pub async fn get_weekly_ranking(&self) -> Response {
        self.get("/v1/weekly-ranking").await
    }

    /// POST /v1/weekly-ranking/refresh
    pub async fn refresh_weekly_ranking(&self) -> Response {
        self.client
            .post(format!("{}/v1/weekly-ranking/refresh", self.base_url))
            .send()
            .await
            .expect("Refresh request failed")
    }

    // ========================================================================
    // Job Endpoints
    // ========================================================================

    /// GET /v1/jobs
    pub async fn get_jobs(&self) -> Response {
        self.get("/v1/jobs").await
    }

    /// GET /v1/jobs/{id}
    pub async fn get_job(&self, id: &str) -> Response {
        self.get(&format!("/v1/jobs/{}", id)).await
    }

    /// Polls GET /v1/jobs/{id} until the job has a finished run
    ///
    /// # Panics
    ///
    /// Panics if the job does not finish within `JOB_COMPLETION_TIMEOUT_MS`.
    pub async fn wait_for_job_run(&self, id: &str) -> serde_json::Value {
        let start = std::time::Instant::now();
        loop {
            let job: serde_json::Value = self.get_job(id).await.json().await.unwrap();
            if !job["last_run"]["finished_at"].is_null() {
                return job;
            }
            if start.elapsed() > Duration::from_millis(JOB_COMPLETION_TIMEOUT_MS) {
                panic!("Job {} did not finish: {}", id, job);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    // ========================================================================
    // User Endpoints
    // ========================================================================

    /// POST /v1/users
    pub async fn create_user(&self, handle: &str, email: Option<&str>) -> Response {
        self.client
            .post(format!("{}/v1/users", self.base_url))
            .json(&json!({
                "handle": handle,
                "email": email,
            }))
            .send()
            .await
            .expect("Create user request failed")
    }

    /// GET /v1/users/{id}
    pub async fn get_user(&self, id: i64) -> Response {
        self.get(&format!("/v1/users/{}", id)).await
    }

    // ========================================================================
    // Song and Rating Endpoints
    // ========================================================================

    /// GET /v1/songs/{id}
    pub async fn get_song(&self, id: &str) -> Response {
        self.get(&format!("/v1/songs/{}", id)).await
    }

    /// POST /v1/songs/{id}/rate
    pub async fn rate_song(
        &self,
        song_id: &str,
        user_id: i64,
        value: i64,
        comment: Option<&str>,
    ) -> Response {
        self.client
            .post(format!("{}/v1/songs/{}/rate", self.base_url, song_id))
            .json(&json!({
                "uid": user_id,
                "rate_value": value,
                "comment": comment,
            }))
            .send()
            .await
            .expect("Rate request failed")
    }

    /// GET /v1/ratings/average
    pub async fn get_rating_averages(&self) -> Response {
        self.get("/v1/ratings/average").await
    }
}
