//! Margin loan requests.

use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use tracing::info;

use crate::application::handlers::ApiError;
use crate::application::AppState;
use crate::auth::Claims;
use crate::domain::errors::{validate_amount, DomainError};
use crate::persistence::loans::LoanRepository;
use crate::persistence::models::{CreateLoanRequest, LoanRecord};
use crate::persistence::DatabaseError;

#[derive(Debug, Deserialize)]
pub struct LoanRequestBody {
    pub amount: f64,
    pub duration_months: i64,
}

/// The caller's current loan request, if any.
pub async fn get_loan(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Option<LoanRecord>>, ApiError> {
    let repo = LoanRepository::new(state.pool.clone());
    let record = repo.get_for_user(&claims.sub).await?;
    Ok(Json(record))
}

/// File a margin loan request. Only one non-rejected request may exist
/// per user; the database enforces this even under concurrent submits.
pub async fn create_loan(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<LoanRequestBody>,
) -> Result<Json<LoanRecord>, ApiError> {
    let amount = validate_amount(req.amount)?;
    if !(1..=120).contains(&req.duration_months) {
        return Err(DomainError::Validation(
            "Loan duration must be between 1 and 120 months".to_string(),
        )
        .into());
    }

    let repo = LoanRepository::new(state.pool.clone());
    let record = repo
        .create(CreateLoanRequest {
            user_id: claims.sub.clone(),
            amount,
            duration_months: req.duration_months,
        })
        .await
        .map_err(|e| match e {
            DatabaseError::ConstraintViolation(_) => DomainError::InvalidState(
                "An active loan request already exists for this account".to_string(),
            ),
            other => DomainError::from(other),
        })?;

    info!(
        "Loan request {} filed by {}: {} over {} months",
        record.id, claims.sub, record.amount, record.duration_months
    );
    Ok(Json(record))
}
