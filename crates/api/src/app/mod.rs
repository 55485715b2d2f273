//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: ledger store selection and the realtime channel
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router around already-wired services.
///
/// Only `/health` is reachable without a bearer token.
pub fn build_app(jwt_secret: &str, services: Arc<services::AppServices>) -> Router {
    let jwt = Arc::new(depot_auth::Hs256JwtValidator::new(jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    // Layers run top to bottom: authenticate first, then expose the services.
    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::auth_middleware,
            ))
            .layer(Extension(services)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}

/// In-memory router for tests and local experiments.
pub fn build_in_memory_app(jwt_secret: &str) -> Router {
    build_app(jwt_secret, Arc::new(services::AppServices::in_memory()))
}
