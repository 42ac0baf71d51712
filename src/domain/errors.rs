use thiserror::Error;

use crate::persistence::DatabaseError;

/// Business error taxonomy surfaced by every operation.
///
/// Handlers map these onto HTTP statuses; the mapping is the only place
/// transport concerns appear.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        DomainError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<DatabaseError> for DomainError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::ConstraintViolation(msg) => DomainError::InvalidState(msg),
            other => DomainError::Upstream(other.to_string()),
        }
    }
}

/// Validate a money amount supplied by a caller.
pub fn validate_amount(amount: f64) -> Result<f64, DomainError> {
    if !amount.is_finite() {
        return Err(DomainError::Validation("Amount must be finite".to_string()));
    }
    if amount <= 0.0 {
        return Err(DomainError::Validation(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(amount)
}
