use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use warehouse_core::{LocationId, SystemName};

use crate::app::errors;

#[derive(Debug, Deserialize)]
pub struct CreateSystemRequest {
    pub name: SystemName,
}

#[derive(Debug, Deserialize)]
pub struct RegisterStorageRequest {
    pub id: LocationId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProcessorRequest {
    pub process: String,
    pub input_id: LocationId,
    pub output_id: LocationId,
}

#[derive(Debug, Deserialize)]
pub struct RegisterTerminalRequest {
    pub name: String,
    pub id: LocationId,
}

/// Unwrap a JSON body, answering malformed ones with a 400 in the shared
/// error shape. Model validation runs during deserialization, so a body that
/// breaks an invariant lands here too.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "malformed_input",
            rejection.body_text(),
        )),
    }
}
