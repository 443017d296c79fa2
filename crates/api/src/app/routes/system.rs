use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode};

use crate::app::services::AppServices;

/// Liveness plus a store round trip when running against Postgres.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> StatusCode {
    match services.check_health().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
