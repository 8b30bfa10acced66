/*!
 * # Health Check Module
 *
 * - Basic health check (`/health`) - store connectivity, 503 when the store is down
 * - Version (`/health/version`) - build information
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};
use tracing::{error, info};

use crate::{db::ConnectionProvider, AppState};

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

/// Health check detail
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthDetail {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Overall health information
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub details: BTreeMap<String, HealthDetail>,
}

impl HealthInfo {
    pub fn status_code(&self) -> StatusCode {
        match self.status {
            HealthStatus::Up => StatusCode::OK,
            HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

fn uptime(started_at: SystemTime) -> u64 {
    SystemTime::now()
        .duration_since(started_at)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Probes the store through the shared connection provider.
pub async fn check_store(provider: &dyn ConnectionProvider) -> HealthDetail {
    let (status, message) = match provider.connection().await {
        Ok(_) => (HealthStatus::Up, None),
        Err(e) => {
            error!("Store health check failed: {}", e);
            (HealthStatus::Down, Some(e.response_message()))
        }
    };

    HealthDetail {
        status,
        message,
        timestamp: Utc::now(),
    }
}

pub async fn collect_health(state: &AppState) -> HealthInfo {
    let mut details = BTreeMap::new();
    details.insert(
        "database".to_string(),
        check_store(state.provider.as_ref()).await,
    );

    let status = if details.values().any(|d| d.status == HealthStatus::Down) {
        HealthStatus::Down
    } else {
        HealthStatus::Up
    };

    HealthInfo {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        uptime_seconds: uptime(state.started_at),
        details,
    }
}

/// Basic health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    info!("Health check endpoint called");
    let health = collect_health(&state).await;
    (health.status_code(), Json(health))
}

/// Returns build and version information
pub async fn version_info() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Creates router with health check endpoints
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/version", get(version_info))
}
