use axum::{Router, routing::get};

pub mod common;
pub mod parts;
pub mod system;
pub mod transactions;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/transactions", transactions::router())
        .merge(parts::router())
}
