use axum::http::StatusCode;

/// Liveness probe.
pub async fn check() -> StatusCode {
    StatusCode::NO_CONTENT
}
