use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    // Leave headroom above the upload ceiling for the rest of the form.
    let body_limit = state.config.limits.max_file_size_mb * 1024 * 1024 + 64 * 1024;

    Router::new()
        // System
        .route("/health", get(handlers::health_check))
        .route("/models", get(handlers::get_models))
        // Transcription
        .route("/asr/transcribe", post(handlers::transcribe))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
