//! Retail Insights Library
//!
//! Answers natural-language business questions about a retail ordering
//! dataset. Questions are classified into one of a fixed set of reports,
//! the report runs against the relational store and the rows are narrated
//! by a language model. The same reports are exposed over HTTP, a
//! line-oriented JSON-RPC tool protocol and a CLI.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod services;
pub mod tools;
pub mod tracing;

use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::SystemTime;
use tower_http::cors::CorsLayer;

use crate::{
    config::AppConfig,
    db::{ConnectionProvider, LazyConnection},
    errors::ServiceError,
    services::{
        assistant::Assistant,
        classifier::Classifier,
        dispatcher::ReportDispatcher,
        language_model::{GeminiClient, TextGenerator},
        narrator::Narrator,
        reports::ReportService,
    },
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub provider: Arc<dyn ConnectionProvider>,
    pub reports: ReportService,
    pub assistant: Assistant,
    pub started_at: SystemTime,
}

impl AppState {
    /// Wires the question pipeline around an existing store provider.
    ///
    /// Without a text generator, classification is keyword-only and answers
    /// fall back to the raw report rows.
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn ConnectionProvider>,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        let reports = ReportService::new(provider.clone());
        let assistant = Assistant::new(
            Classifier::new(generator.clone()),
            ReportDispatcher::new(reports.clone()),
            Narrator::new(generator, config.answer_language.clone()),
        );

        Self {
            config: Arc::new(config),
            provider,
            reports,
            assistant,
            started_at: SystemTime::now(),
        }
    }

    /// Builds the state from configuration. Nothing is connected yet.
    pub fn from_config(config: AppConfig) -> Result<Self, ServiceError> {
        let provider: Arc<dyn ConnectionProvider> =
            Arc::new(LazyConnection::from_app_config(&config));

        let generator: Option<Arc<dyn TextGenerator>> = if config.has_llm_credentials() {
            Some(Arc::new(GeminiClient::from_config(&config)?))
        } else {
            ::tracing::warn!(
                "No language model API key configured; answers will contain raw report rows"
            );
            None
        };

        Ok(Self::new(config, provider, generator))
    }
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Retail Insights API",
        "status": "running",
    }))
}

/// Full HTTP application: status, health, the chat page and the `/api` routes.
pub fn app_router(state: AppState) -> Router {
    Router::<AppState>::new()
        .route("/", get(root))
        .merge(handlers::chat::chat_routes(&state.config.static_dir))
        .nest("/health", health::health_routes())
        .nest("/api", handlers::api_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CorsLayer::permissive())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
        .with_state(state)
}
