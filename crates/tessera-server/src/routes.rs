use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/get-sql", post(handlers::get_sql))
        .route("/execute-sql", post(handlers::execute_sql))
        .route("/get-tables/{datasource_id}", get(handlers::get_tables))
        .route("/get-datasources", get(handlers::get_datasources))
        .route("/get-user-details", get(handlers::get_user_details))
        .route("/admin/reload-catalog", post(handlers::reload_catalog))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
