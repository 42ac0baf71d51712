//! Database Models
//!
//! Persistent data structures for users, transactions, orders, loan
//! requests and payment endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User account record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub name: String,
    pub role: String, // "admin" or "customer"
    pub is_verified: bool,
    pub address: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
    pub ifsc_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Money movement record (deposit or withdrawal)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    pub reference: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String, // "DEPOSIT" or "WITHDRAW"
    pub status: String, // "PENDING", "COMPLETED" or "FAILED"
    pub verified: bool,
    pub amount: f64,
    pub currency: String,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Trade position record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderRecord {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub quantity: f64,
    pub buy_price: f64,
    pub sell_price: Option<f64>,
    pub trade_amount: f64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String, // "LONG" or "SHORT"
    pub status: String, // "OPEN", "PENDING_SELL" or "CLOSED"
    pub profit_loss: Option<f64>,
    pub trade_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Margin loan request record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoanRecord {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub duration_months: i64,
    pub status: String, // "PENDING", "APPROVED" or "REJECTED"
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// UPI payment endpoint record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentEndpointRecord {
    pub id: String,
    pub upi_id: String,
    pub merchant_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a conditional state transition.
///
/// The UPDATE re-checks the precondition at write time; when it touches
/// no row the repository inspects the record to tell the caller whether
/// it is missing or in the wrong state.
#[derive(Debug)]
pub enum Transition<R> {
    Applied(R),
    NotFound,
    WrongState { current: String },
    Invalid(String),
}

/// Create user input
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub address: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
    pub ifsc_code: Option<String>,
}

/// Update user profile input (identity and credentials are not touched)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserProfile {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
    pub ifsc_code: Option<String>,
}

/// Create transaction input
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub user_id: String,
    pub reference: String,
    pub kind: String,
    pub amount: f64,
    pub description: Option<String>,
}

/// Create order input (trade entry)
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub user_id: String,
    pub symbol: String,
    pub quantity: f64,
    pub buy_price: f64,
    pub kind: String,
    pub trade_date: DateTime<Utc>,
}

/// Create loan request input
#[derive(Debug, Clone)]
pub struct CreateLoanRequest {
    pub user_id: String,
    pub amount: f64,
    pub duration_months: i64,
}
