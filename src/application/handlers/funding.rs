//! Deposits, withdrawals and the public UPI payment endpoint.

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::handlers::ApiError;
use crate::application::AppState;
use crate::auth::Claims;
use crate::domain::entities::transaction::TransactionKind;
use crate::domain::errors::{validate_amount, DomainError};
use crate::persistence::models::{CreateTransaction, TransactionRecord};
use crate::persistence::payments::PaymentEndpointRepository;
use crate::persistence::transactions::TransactionRepository;

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: f64,
    /// Payment reference entered by the customer (e.g. UPI transaction id).
    pub reference: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: f64,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentInfoResponse {
    pub upi_id: String,
    pub merchant_name: String,
}

/// Record a deposit claim. It stays PENDING and unverified until an
/// administrator confirms receipt of funds.
pub async fn create_deposit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<TransactionRecord>, ApiError> {
    let amount = validate_amount(req.amount)?;

    let reference = match req.reference {
        Some(r) if !r.trim().is_empty() => r.trim().to_string(),
        _ => format!("DEP{}", Utc::now().timestamp_millis()),
    };

    let repo = TransactionRepository::new(state.pool.clone());
    let record = repo
        .create(CreateTransaction {
            user_id: claims.sub.clone(),
            reference,
            kind: TransactionKind::Deposit.as_str().to_string(),
            amount,
            description: req.description,
        })
        .await?;

    info!(
        "Deposit claim {} for user {}: {} {}",
        record.reference, claims.sub, record.amount, record.currency
    );
    Ok(Json(record))
}

/// Request a withdrawal. Funds leave the balance only once an
/// administrator approves the request.
pub async fn create_withdrawal(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<WithdrawalRequest>,
) -> Result<Json<TransactionRecord>, ApiError> {
    let amount = validate_amount(req.amount)?;

    let repo = TransactionRepository::new(state.pool.clone());
    let record = repo
        .create(CreateTransaction {
            user_id: claims.sub.clone(),
            reference: format!("WD{}", Utc::now().timestamp_millis()),
            kind: TransactionKind::Withdraw.as_str().to_string(),
            amount,
            description: req.description,
        })
        .await?;

    info!(
        "Withdrawal request {} for user {}: {} {}",
        record.reference, claims.sub, record.amount, record.currency
    );
    Ok(Json(record))
}

/// The caller's own transaction history, newest first.
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<TransactionRecord>>, ApiError> {
    let repo = TransactionRepository::new(state.pool.clone());
    let records = repo.list_for_user(&claims.sub).await?;
    Ok(Json(records))
}

/// Active UPI endpoint customers should pay deposits into. Open route:
/// shown on the deposit screen before login completes.
pub async fn get_payment_info(
    State(state): State<AppState>,
) -> Result<Json<PaymentInfoResponse>, ApiError> {
    let repo = PaymentEndpointRepository::new(state.pool.clone());
    let endpoint = repo
        .get_active()
        .await?
        .ok_or_else(|| DomainError::not_found("payment endpoint", "active"))?;

    Ok(Json(PaymentInfoResponse {
        upi_id: endpoint.upi_id,
        merchant_name: endpoint.merchant_name,
    }))
}
