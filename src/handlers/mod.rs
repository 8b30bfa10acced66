pub mod chat;
pub mod common;
pub mod insights;
pub mod query;
pub mod sales;

use axum::Router;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// All `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(query::query_routes())
        .nest("/sales", sales::sales_routes())
        .nest("/insights", insights::insights_routes())
}
