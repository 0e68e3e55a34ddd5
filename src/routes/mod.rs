// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Structure:
// - mod.rs: Main router assembly and middleware
// - health.rs: Health check and metrics endpoints
// - chat.rs: History, conversation list, mark-as-read, image upload
// - extractors.rs: Custom Axum extractors (AuthenticatedUser)
// - middleware.rs: Request logging
//
// The websocket endpoint lives in crate::handlers.
//
// ============================================================================

mod chat;
mod extractors;
mod health;
mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::handlers;
use crate::media::UPLOADS_ROUTE;

pub use chat::UploadResponse;
pub use extractors::AuthenticatedUser;

/// Create the main application router with all routes
pub fn create_router(app_context: Arc<AppContext>) -> Router {
    let upload_limit = app_context.config.media.max_file_size;
    let uploads = ServeDir::new(&app_context.config.media.upload_dir);

    Router::new()
        // Health and monitoring
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(health::metrics))
        // Realtime socket
        .route("/ws", get(handlers::websocket_upgrade))
        // Chat API
        .route("/api/v1/chat/conversations", get(chat::list_conversations))
        .route(
            "/api/v1/chat/conversations/:conversation_id/messages",
            get(chat::conversation_messages),
        )
        .route(
            "/api/v1/chat/conversations/:conversation_id/read",
            patch(chat::mark_as_read),
        )
        .route("/api/v1/chat/messages/:peer_id", get(chat::direct_messages))
        .route(
            "/api/v1/chat/images",
            // Multipart framing on top of the file itself
            post(chat::upload_image).layer(DefaultBodyLimit::max(upload_limit + 64 * 1024)),
        )
        .nest_service(UPLOADS_ROUTE, uploads)
        // Apply middleware (order matters - last added runs first)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(middleware::request_logging))
                .into_inner(),
        )
        .with_state(app_context)
}
