pub mod couples;
pub mod health;
pub mod invitations;
pub mod password_reset;
pub mod usage;

use axum::Extension;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::auth::JwtSecret;
use crate::state::AppState;
use pairplan_core::traits::*;

pub fn build_router<L, U>(state: AppState<L, U>) -> axum::Router
where
    L: LinkageStore,
    U: UsageStore,
{
    let jwt_secret = JwtSecret(state.config.jwt.access_secret.clone());

    axum::Router::new()
        .route("/health", get(health::health_check))
        // Invitations
        .route(
            "/api/invitations",
            post(invitations::create_invitation::<L, U>),
        )
        .route(
            "/api/invitations/current",
            get(invitations::current_invitation::<L, U>),
        )
        .route(
            "/api/invitations/verify",
            post(invitations::verify_invitation::<L, U>),
        )
        // Couples
        .route("/api/couples", post(couples::create_couple::<L, U>))
        .route("/api/couples/status", get(couples::couple_status::<L, U>))
        // Usage quota
        .route("/api/usage/limit", get(usage::check_limit::<L, U>))
        .route("/api/usage/record", post(usage::record_usage::<L, U>))
        // Unauthenticated, rate limited
        .route(
            "/api/password-reset",
            post(password_reset::request_password_reset::<L, U>),
        )
        .layer(Extension(jwt_secret))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
                .expose_headers(tower_http::cors::Any),
        )
        // Request bodies here are small JSON documents.
        .layer(tower_http::limit::RequestBodyLimitLayer::new(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
