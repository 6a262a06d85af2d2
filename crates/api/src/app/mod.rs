//! HTTP API application wiring (Axum router + shared state).
//!
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request bodies and JSON rejection mapping
//! - `errors.rs`: consistent error responses

use axum::{routing::get, Extension, Router};

use warehouse_infra::SystemRegistry;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(registry: SystemRegistry) -> Router {
    Router::new()
        .route("/check", get(routes::system::check))
        .merge(routes::router())
        .layer(Extension(registry))
}
