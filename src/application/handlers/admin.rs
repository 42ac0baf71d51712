//! Back-office handlers: signup approval, funding verification,
//! settlement and loan decisions.
//!
//! Every state change here is a conditional write. The repositories
//! re-check the expected prior state inside the UPDATE itself, so two
//! administrators racing on the same record produce exactly one applied
//! transition and one CONFLICT.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::application::handlers::{resolve, ApiError};
use crate::application::AppState;
use crate::domain::entities::order::{settlement_profit_loss, TradeKind};
use crate::domain::errors::DomainError;
use crate::persistence::loans::LoanRepository;
use crate::persistence::models::{
    LoanRecord, OrderRecord, PaymentEndpointRecord, TransactionRecord, UpdateUserProfile,
    UserRecord,
};
use crate::persistence::orders::OrderRepository;
use crate::persistence::payments::PaymentEndpointRepository;
use crate::persistence::snapshot::SnapshotRepository;
use crate::persistence::transactions::TransactionRepository;
use crate::persistence::users::UserRepository;

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub approve: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpiUpdateRequest {
    pub upi_id: String,
    pub merchant_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserDetailResponse {
    pub user: UserRecord,
    pub transactions: Vec<TransactionRecord>,
    pub orders: Vec<OrderRecord>,
    pub loan: Option<LoanRecord>,
}

/// All registered users.
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserRecord>>, ApiError> {
    let repo = UserRepository::new(state.pool.clone());
    Ok(Json(repo.list_all().await?))
}

/// One user with their full account history.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserDetailResponse>, ApiError> {
    let users = UserRepository::new(state.pool.clone());
    let user = users
        .get(&id)
        .await?
        .ok_or_else(|| DomainError::not_found("user", &id))?;

    let snapshot = SnapshotRepository::new(state.pool.clone())
        .account_snapshot(&id)
        .await?;

    Ok(Json(UserDetailResponse {
        user,
        transactions: snapshot.transactions,
        orders: snapshot.orders,
        loan: snapshot.loan,
    }))
}

/// Edit a user's profile on their behalf.
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<UpdateUserProfile>,
) -> Result<Json<UserRecord>, ApiError> {
    let repo = UserRepository::new(state.pool.clone());
    let user = repo
        .update_profile(&id, changes)
        .await?
        .ok_or_else(|| DomainError::not_found("user", &id))?;
    Ok(Json(user))
}

/// Delete a user and everything they own, in one transaction.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repo = UserRepository::new(state.pool.clone());
    if !repo.delete_cascading(&id).await? {
        return Err(DomainError::not_found("user", &id).into());
    }

    info!("User {} deleted with all owned records", id);
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// Approve a pending signup.
pub async fn verify_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repo = UserRepository::new(state.pool.clone());
    if !repo.mark_verified(&id).await? {
        return Err(DomainError::not_found("user", &id).into());
    }

    info!("User {} verified", id);
    Ok(Json(serde_json::json!({ "verified": id })))
}

/// Confirm (or reject) receipt of a claimed deposit.
///
/// Approval marks the transaction COMPLETED and verified in the same
/// statement, so a deposit can never count toward a balance while
/// unconfirmed. Terminal transactions are immutable.
pub async fn verify_deposit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<TransactionRecord>, ApiError> {
    let repo = TransactionRepository::new(state.pool.clone());
    let outcome = repo.verify_deposit(&id, req.approve).await?;
    let record = resolve(outcome, "deposit", &id)?;

    info!(
        "Deposit {} ({}) {}",
        record.id,
        record.reference,
        if req.approve { "verified" } else { "rejected" }
    );
    Ok(Json(record))
}

/// Approve or reject a pending withdrawal.
pub async fn decide_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<TransactionRecord>, ApiError> {
    let repo = TransactionRepository::new(state.pool.clone());
    let outcome = repo.decide_withdrawal(&id, req.approve).await?;
    let record = resolve(outcome, "withdrawal", &id)?;

    info!(
        "Withdrawal {} ({}) {}",
        record.id,
        record.reference,
        if req.approve { "approved" } else { "rejected" }
    );
    Ok(Json(record))
}

/// Settle a position the customer asked to sell.
///
/// Profit or loss is computed inside the UPDATE from the recorded
/// prices, so the stored figure always matches the stored prices.
pub async fn close_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderRecord>, ApiError> {
    let repo = OrderRepository::new(state.pool.clone());
    let outcome = repo.settle(&id).await?;
    let record = resolve(outcome, "order", &id)?;

    // The stored figure must agree with the settlement formula; a
    // mismatch means the row was edited outside the settlement path.
    if let (Some(kind), Some(sell_price), Some(stored)) = (
        TradeKind::parse(&record.kind),
        record.sell_price,
        record.profit_loss,
    ) {
        let expected = settlement_profit_loss(kind, record.buy_price, sell_price, record.quantity);
        if (stored - expected).abs() > 1e-9 {
            error!(
                "Order {} profit figure {} disagrees with recorded prices (expected {})",
                record.id, stored, expected
            );
        }
    }

    info!(
        "Order {} settled: P/L {}",
        record.id,
        record.profit_loss.unwrap_or(0.0)
    );
    Ok(Json(record))
}

/// Remove an order outright (bookkeeping correction for a mis-entered
/// trade). The reconciler simply stops seeing it.
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repo = OrderRepository::new(state.pool.clone());
    if !repo.delete(&id).await? {
        return Err(DomainError::not_found("order", &id).into());
    }

    info!("Order {} deleted", id);
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// Every transaction across all accounts, newest first.
pub async fn list_transactions(
    State(state): State<AppState>,
) -> Result<Json<Vec<TransactionRecord>>, ApiError> {
    let repo = TransactionRepository::new(state.pool.clone());
    Ok(Json(repo.list_all().await?))
}

/// Every order across all accounts, newest first.
pub async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<OrderRecord>>, ApiError> {
    let repo = OrderRepository::new(state.pool.clone());
    Ok(Json(repo.list_all().await?))
}

/// All loan requests.
pub async fn list_loans(
    State(state): State<AppState>,
) -> Result<Json<Vec<LoanRecord>>, ApiError> {
    let repo = LoanRepository::new(state.pool.clone());
    Ok(Json(repo.list_all().await?))
}

/// Approve or reject a pending loan request. An approved loan counts
/// toward the customer's balance from the moment this commits.
pub async fn decide_loan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<LoanRecord>, ApiError> {
    let repo = LoanRepository::new(state.pool.clone());
    let outcome = repo.decide(&id, req.approve).await?;
    let record = resolve(outcome, "loan request", &id)?;

    info!(
        "Loan request {} {}",
        record.id,
        if req.approve { "approved" } else { "rejected" }
    );
    Ok(Json(record))
}

/// Replace the active UPI deposit endpoint.
pub async fn set_payment_info(
    State(state): State<AppState>,
    Json(req): Json<UpiUpdateRequest>,
) -> Result<Json<PaymentEndpointRecord>, ApiError> {
    if req.upi_id.trim().is_empty() {
        return Err(DomainError::Validation("UPI id is required".to_string()).into());
    }

    let merchant = req.merchant_name.unwrap_or_else(|| "Astex".to_string());
    let repo = PaymentEndpointRepository::new(state.pool.clone());
    let record = repo.replace_active(req.upi_id.trim(), &merchant).await?;

    info!("Active UPI endpoint replaced: {}", record.upi_id);
    Ok(Json(record))
}
