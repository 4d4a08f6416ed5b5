use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    booking_handler, bookings_handler, cached_bookings_handler, cancel_handler, health_handler,
    not_found_handler, reschedule_handler, root_handler, webhook_handler,
};
use crate::server::AppState;

/// Routes are served both bare and under `/api` for older clients.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/bookings", get(bookings_handler))
        .route("/api/bookings", get(bookings_handler))
        .route("/api/bookings/{uid}", get(booking_handler))
        .route("/reschedule", post(reschedule_handler))
        .route("/api/reschedule", post(reschedule_handler))
        .route("/cancel", post(cancel_handler))
        .route("/api/cancel", post(cancel_handler))
        .route("/webhook/calcom", post(webhook_handler))
        .route("/webhook/bookings", get(cached_bookings_handler))
        .fallback(not_found_handler)
        .method_not_allowed_fallback(not_found_handler)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
