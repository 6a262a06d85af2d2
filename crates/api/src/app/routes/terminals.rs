use axum::{
    extract::{Extension, Path},
    routing::post,
    Router,
};

use warehouse_core::DomainError;
use warehouse_infra::SystemRegistry;

use crate::app::routes::systems::resolve;
use crate::app::errors;

pub fn router() -> Router {
    Router::new()
        .route("/:system/terminals/:name/withdraw", post(withdraw))
        .route("/:system/terminals/:name/deposit", post(deposit))
}

pub async fn withdraw(
    Extension(registry): Extension<SystemRegistry>,
    Path((system, name)): Path<(String, String)>,
) -> axum::response::Response {
    not_implemented(&registry, &system, &name, "withdraw").await
}

pub async fn deposit(
    Extension(registry): Extension<SystemRegistry>,
    Path((system, name)): Path<(String, String)>,
) -> axum::response::Response {
    not_implemented(&registry, &system, &name, "deposit").await
}

/// Item movement has no execution algorithm yet. The system and terminal
/// are still resolved so callers get a 404 for bad addresses.
async fn not_implemented(
    registry: &SystemRegistry,
    system: &str,
    terminal: &str,
    operation: &str,
) -> axum::response::Response {
    let handle = match resolve(registry, system) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let snapshot = match handle.snapshot().await {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if snapshot.terminal(terminal).is_none() {
        return errors::domain_error_to_response(DomainError::not_found(format!(
            "terminal {terminal} in system {system}"
        )));
    }
    errors::domain_error_to_response(DomainError::not_implemented(format!(
        "{operation} at terminal {terminal}"
    )))
}
