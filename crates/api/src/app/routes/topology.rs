use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::json;

use warehouse_infra::SystemRegistry;

use crate::app::routes::systems::resolve;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:system/storage", post(register_storage))
        .route("/:system/processors", post(register_processor))
        .route("/:system/terminals", post(register_terminal))
        .route("/:system/reindex", post(reindex))
}

pub async fn register_storage(
    Extension(registry): Extension<SystemRegistry>,
    Path(system): Path<String>,
    payload: Result<Json<dto::RegisterStorageRequest>, JsonRejection>,
) -> axum::response::Response {
    let handle = match resolve(&registry, &system) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match handle.register_storage(body.id.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(json!({ "id": body.id }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn register_processor(
    Extension(registry): Extension<SystemRegistry>,
    Path(system): Path<String>,
    payload: Result<Json<dto::RegisterProcessorRequest>, JsonRejection>,
) -> axum::response::Response {
    let handle = match resolve(&registry, &system) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let created = json!({
        "process": body.process,
        "inputId": body.input_id,
        "outputId": body.output_id,
    });
    match handle
        .register_processor(body.process, body.input_id, body.output_id)
        .await
    {
        Ok(()) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn register_terminal(
    Extension(registry): Extension<SystemRegistry>,
    Path(system): Path<String>,
    payload: Result<Json<dto::RegisterTerminalRequest>, JsonRejection>,
) -> axum::response::Response {
    let handle = match resolve(&registry, &system) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let created = json!({ "name": body.name, "id": body.id });
    match handle.register_terminal(body.name, body.id).await {
        Ok(()) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn reindex(
    Extension(registry): Extension<SystemRegistry>,
    Path(system): Path<String>,
) -> axum::response::Response {
    let handle = match resolve(&registry, &system) {
        Ok(h) => h,
        Err(resp) => return resp,
    };

    match handle.reindex().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
