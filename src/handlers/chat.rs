use std::path::Path;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::services::ServeDir;
use tracing::warn;

use crate::AppState;

const MISSING_PAGE: &str =
    "<h1>Static files not found</h1><p>Please ensure static/index.html exists</p>";

/// `GET /chat`, plus `/static` when the asset directory exists.
pub fn chat_routes(static_dir: &str) -> Router<AppState> {
    let router = Router::new().route("/chat", get(chat_page));
    if Path::new(static_dir).is_dir() {
        router.nest_service("/static", ServeDir::new(static_dir))
    } else {
        warn!(static_dir, "Static directory not found; /static is not mounted");
        router
    }
}

/// Serves the chat page from `{static_dir}/index.html`.
pub async fn chat_page(State(state): State<AppState>) -> Response {
    let page = Path::new(&state.config.static_dir).join("index.html");
    match tokio::fs::read_to_string(&page).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            warn!(path = %page.display(), "Chat page unavailable: {}", e);
            (StatusCode::NOT_FOUND, Html(MISSING_PAGE)).into_response()
        }
    }
}
