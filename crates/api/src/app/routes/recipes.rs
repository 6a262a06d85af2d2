use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};

use warehouse_inventory::Recipe;
use warehouse_infra::SystemRegistry;

use crate::app::routes::systems::resolve;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:system/recipes", post(register_recipe))
        .route("/:system/recipes/:index", delete(remove_recipe))
        .route("/:system/run-processors", post(run_processors))
}

pub async fn register_recipe(
    Extension(registry): Extension<SystemRegistry>,
    Path(system): Path<String>,
    payload: Result<Json<Recipe>, JsonRejection>,
) -> axum::response::Response {
    let handle = match resolve(&registry, &system) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let recipe = match dto::body(payload) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match handle.register_recipe(recipe.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(recipe)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn remove_recipe(
    Extension(registry): Extension<SystemRegistry>,
    Path((system, index)): Path<(String, String)>,
) -> axum::response::Response {
    let handle = match resolve(&registry, &system) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let index: usize = match index.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "malformed_input",
                "recipe index must be a non-negative integer",
            );
        }
    };

    match handle.remove_recipe(index).await {
        Ok(removed) => Json(removed).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Reports which recipes need restocking. Nothing is moved or started.
pub async fn run_processors(
    Extension(registry): Extension<SystemRegistry>,
    Path(system): Path<String>,
) -> axum::response::Response {
    let handle = match resolve(&registry, &system) {
        Ok(h) => h,
        Err(resp) => return resp,
    };

    match handle.restock_plan().await {
        Ok(plan) => Json(serde_json::json!({ "executed": false, "plan": plan })).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
