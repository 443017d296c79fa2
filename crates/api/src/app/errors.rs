use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use catalog_core::DomainError;
use catalog_products::ProductServiceError;

pub fn service_error_to_response(err: ProductServiceError) -> axum::response::Response {
    match err {
        ProductServiceError::NotFound { message, .. } => {
            json_error(StatusCode::NOT_FOUND, "not_found", message)
        }
        ProductServiceError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
        ProductServiceError::Store(e) => {
            tracing::error!(error = %e, "product store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
    }
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
