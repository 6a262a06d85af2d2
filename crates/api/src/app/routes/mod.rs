use axum::Router;

pub mod controller;
pub mod recipes;
pub mod system;
pub mod systems;
pub mod terminals;
pub mod topology;

/// Router for every endpoint except liveness.
pub fn router() -> Router {
    Router::new()
        .merge(controller::router())
        .merge(systems::router())
        .merge(topology::router())
        .merge(recipes::router())
        .merge(terminals::router())
}
