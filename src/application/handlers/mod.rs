//! HTTP request handlers.
//!
//! Handlers stay thin: validate input, call a repository or domain
//! service, translate the outcome. All error-to-status mapping lives in
//! [`ApiError`]; repositories never see HTTP.

pub mod account;
pub mod admin;
pub mod funding;
pub mod lending;
pub mod trading;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::application::AppState;
use crate::domain::errors::DomainError;
use crate::persistence::models::Transition;

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Transport-facing wrapper around [`DomainError`].
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError(e)
    }
}

impl From<crate::persistence::DatabaseError> for ApiError {
    fn from(e: crate::persistence::DatabaseError) -> Self {
        ApiError(DomainError::from(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, self.0.to_string()),
            DomainError::InvalidState(_) => (StatusCode::CONFLICT, self.0.to_string()),
            DomainError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, self.0.to_string()),
            DomainError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string()),
            DomainError::Upstream(detail) => {
                // Internals stay in the log, not the response body.
                error!("Upstream failure: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    "Service temporarily unavailable. Please try again.".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Resolve a conditional-write outcome into a record or a domain error.
pub(crate) fn resolve<R>(
    transition: Transition<R>,
    entity: &'static str,
    id: &str,
) -> Result<R, ApiError> {
    match transition {
        Transition::Applied(record) => Ok(record),
        Transition::NotFound => Err(DomainError::not_found(entity, id).into()),
        Transition::WrongState { current } => Err(DomainError::InvalidState(format!(
            "{} {}: {}",
            entity, id, current
        ))
        .into()),
        Transition::Invalid(message) => Err(DomainError::Validation(message).into()),
    }
}

/// Database liveness check.
pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .map_err(|e| DomainError::Upstream(format!("Health check query failed: {}", e)))?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}
