//! Route definitions for the fermentation server

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Sensor ingestion (signed, no JWT)
        .route("/iot/readings", post(handlers::ingest_iot_reading))
        // Protected routes
        .merge(protected_routes(state))
}

/// Routes that require a bearer token
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/tanks", tank_routes())
        .nest("/batches", batch_routes())
        .route("/dashboard", get(handlers::get_dashboard))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Tank management routes
fn tank_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_tanks).post(handlers::create_tank))
        .route("/available", get(handlers::list_available_tanks))
        .route(
            "/:tank_id",
            get(handlers::get_tank)
                .put(handlers::update_tank)
                .delete(handlers::delete_tank),
        )
        .route("/:tank_id/batches", get(handlers::list_tank_batches))
}

/// Batch lifecycle, reading and statistics routes
fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::create_batch))
        .route("/active", get(handlers::list_active_batches))
        .route(
            "/:batch_id",
            get(handlers::get_batch)
                .put(handlers::update_batch)
                .delete(handlers::delete_batch),
        )
        .route("/:batch_id/status", post(handlers::change_batch_status))
        .route(
            "/:batch_id/readings",
            get(handlers::list_readings).post(handlers::record_reading),
        )
        .route(
            "/:batch_id/readings/:reading_id",
            axum::routing::delete(handlers::delete_reading),
        )
        .route("/:batch_id/stats", get(handlers::get_batch_stats))
}
