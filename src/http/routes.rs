use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/capture/status", get(handlers::get_status))
        .route("/capture/start", post(handlers::start_recording))
        .route("/capture/stop", post(handlers::stop_recording))
        .route("/capture/cancel", post(handlers::cancel_recording))
        // Recording queries
        .route(
            "/capture/recordings/latest",
            get(handlers::get_latest_recording),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // The UI calling this runs inside the host's webview
        .layer(CorsLayer::permissive())
        .with_state(state)
}
