use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use warehouse_infra::{SystemHandle, SystemRegistry};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/systems", get(list_systems).post(create_system))
        .route("/:system", get(get_system))
        .route("/:system/check", get(check_system))
        .route("/:system/inventory", get(get_inventory))
}

/// Resolve a path segment to a running system.
pub fn resolve(registry: &SystemRegistry, system: &str) -> Result<SystemHandle, axum::response::Response> {
    registry.lookup(system).map_err(errors::domain_error_to_response)
}

pub async fn list_systems(Extension(registry): Extension<SystemRegistry>) -> axum::response::Response {
    Json(registry.names()).into_response()
}

pub async fn create_system(
    Extension(registry): Extension<SystemRegistry>,
    payload: Result<Json<dto::CreateSystemRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match registry.create_system(body.name).await {
        Ok(handle) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "name": handle.name() })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn check_system(
    Extension(registry): Extension<SystemRegistry>,
    Path(system): Path<String>,
) -> axum::response::Response {
    match resolve(&registry, &system) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_system(
    Extension(registry): Extension<SystemRegistry>,
    Path(system): Path<String>,
) -> axum::response::Response {
    let handle = match resolve(&registry, &system) {
        Ok(h) => h,
        Err(resp) => return resp,
    };

    let connected = handle.has_controller();
    match handle.snapshot().await {
        Ok(snapshot) => {
            let mut body = match serde_json::to_value(&snapshot) {
                Ok(v) => v,
                Err(e) => {
                    return errors::json_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "encode_error",
                        e.to_string(),
                    );
                }
            };
            body["controllerConnected"] = serde_json::Value::Bool(connected);
            Json(body).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_inventory(
    Extension(registry): Extension<SystemRegistry>,
    Path(system): Path<String>,
) -> axum::response::Response {
    let handle = match resolve(&registry, &system) {
        Ok(h) => h,
        Err(resp) => return resp,
    };

    match handle.inventory().await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
