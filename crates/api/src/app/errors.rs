use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use warehouse_core::DomainError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        DomainError::MalformedInput(_) => StatusCode::BAD_REQUEST,
        DomainError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::Protocol(_) => StatusCode::BAD_GATEWAY,
        DomainError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        DomainError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::warn!(status = status.as_u16(), error = %err, "request failed");
    }
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
