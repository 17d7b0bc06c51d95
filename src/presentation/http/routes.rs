//! Route Configuration
//!
//! Configures all HTTP routes for the API.
//!
//! Layering under `/api/v1`, outermost first: API rate limit, then JWT
//! auth for protected routes, then the admin guard for `/admin`. Creating
//! bookings and payments also counts against the per-user checkout limit.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{
    auth_middleware, rate_limit_api, rate_limit_auth, rate_limit_checkout, require_admin,
    track_metrics,
};
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        // route_layer so the matched path template is known
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::gather_metrics(),
    )
}

/// API v1 routes
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .nest("/admin", admin_routes(state.clone()))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_api))
}

/// Authentication routes (public, with stricter rate limiting)
fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh_token))
        .route("/logout", post(handlers::auth::logout))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_auth))
}

/// Catalog browsing and the payment provider webhook
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/genres", get(handlers::genre::list_genres))
        .route("/branches", get(handlers::branch::list_branches))
        .route("/branches/{branch_id}", get(handlers::branch::get_branch))
        .route("/branches/{branch_id}/halls", get(handlers::branch::list_branch_halls))
        .route("/halls/{hall_id}", get(handlers::hall::get_hall))
        .route("/movies", get(handlers::movie::list_movies))
        .route("/movies/now-showing", get(handlers::movie::now_showing))
        .route("/movies/coming-soon", get(handlers::movie::coming_soon))
        .route("/movies/{movie_id}", get(handlers::movie::get_movie))
        .route("/movies/{movie_id}/showtimes", get(handlers::movie::movie_showtimes))
        .route("/movies/{movie_id}/reviews", get(handlers::movie::list_reviews))
        .route("/showtimes", get(handlers::showtime::list_showtimes))
        .route("/showtimes/{showtime_id}", get(handlers::showtime::get_showtime))
        .route("/showtimes/{showtime_id}/seats", get(handlers::showtime::seat_map))
        .route("/payments/webhook", post(handlers::payment::webhook))
}

/// Customer routes (require authentication)
fn protected_routes(state: AppState) -> Router<AppState> {
    let checkout = middleware::from_fn_with_state(state.clone(), rate_limit_checkout);

    Router::new()
        .route(
            "/users/me",
            get(handlers::user::get_current_user).patch(handlers::user::update_current_user),
        )
        .route("/users/me/password", post(handlers::user::change_password))
        .route("/movies/{movie_id}/reviews", post(handlers::movie::create_review))
        .route(
            "/reviews/{review_id}",
            patch(handlers::movie::update_review).delete(handlers::movie::delete_review),
        )
        .route(
            "/bookings",
            get(handlers::booking::list_my_bookings)
                .merge(post(handlers::booking::create_booking).layer(checkout.clone())),
        )
        .route("/bookings/{booking_id}", get(handlers::booking::get_booking))
        .route("/bookings/{booking_id}/cancel", post(handlers::booking::cancel_booking))
        .route("/payments", post(handlers::payment::create_payment).layer(checkout))
        .route("/payments/{payment_id}", get(handlers::payment::get_payment))
        .route("/payments/{payment_id}/confirm", post(handlers::payment::confirm_payment))
        .route("/tickets", get(handlers::ticket::list_my_tickets))
        .route("/tickets/{code}", get(handlers::ticket::get_ticket))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Back office (admin role)
fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users", get(handlers::user::list_users))
        .route(
            "/users/{user_id}",
            get(handlers::user::get_user)
                .patch(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
        .route("/branches", post(handlers::branch::create_branch))
        .route(
            "/branches/{branch_id}",
            patch(handlers::branch::update_branch).delete(handlers::branch::delete_branch),
        )
        .route("/halls", post(handlers::hall::create_hall))
        .route(
            "/halls/{hall_id}",
            patch(handlers::hall::update_hall).delete(handlers::hall::delete_hall),
        )
        .route("/halls/{hall_id}/seats/{seat_id}", patch(handlers::hall::update_seat))
        .route("/genres", post(handlers::genre::create_genre))
        .route(
            "/genres/{genre_id}",
            patch(handlers::genre::update_genre).delete(handlers::genre::delete_genre),
        )
        .route("/movies", post(handlers::movie::create_movie))
        .route(
            "/movies/{movie_id}",
            patch(handlers::movie::update_movie).delete(handlers::movie::delete_movie),
        )
        .route("/showtimes", post(handlers::showtime::create_showtime))
        .route("/showtimes/{showtime_id}/cancel", post(handlers::showtime::cancel_showtime))
        .route("/bookings", get(handlers::booking::admin_list_bookings))
        .route("/payments", get(handlers::payment::admin_list_payments))
        .route("/payments/{payment_id}/refund", post(handlers::payment::admin_refund_payment))
        .route("/tickets/{code}/check-in", post(handlers::ticket::check_in))
        .route("/dashboard", get(handlers::dashboard::summary))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
