//! Signup, login, profile and the customer dashboard.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::handlers::ApiError;
use crate::application::AppState;
use crate::auth::{hash_password, verify_password, Claims};
use crate::domain::entities::order::TradeStatus;
use crate::domain::entities::transaction::balance_eligible;
use crate::domain::entities::user::UserRole;
use crate::domain::errors::DomainError;
use crate::domain::services::reconciler::{reconcile, AccountStatement};
use crate::persistence::models::{CreateUser, UpdateUserProfile, UserRecord};
use crate::persistence::models::{OrderRecord, TransactionRecord};
use crate::persistence::snapshot::SnapshotRepository;
use crate::persistence::users::UserRepository;
use crate::persistence::DatabaseError;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub phone: String,
    pub password: String,
    pub name: String,
    pub address: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
    pub ifsc_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_in: usize,
    pub user: UserRecord,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: UserRecord,
    pub statement: AccountStatement,
    pub recent_transactions: Vec<TransactionRecord>,
    pub open_positions: Vec<OrderRecord>,
}

fn validate_signup(req: &SignupRequest) -> Result<(), DomainError> {
    if !req.email.contains('@') {
        return Err(DomainError::Validation(
            "A valid email address is required".to_string(),
        ));
    }
    if req.password.len() < 8 {
        return Err(DomainError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if req.name.trim().is_empty() {
        return Err(DomainError::Validation("Name is required".to_string()));
    }
    if req.phone.trim().is_empty() {
        return Err(DomainError::Validation(
            "Phone number is required".to_string(),
        ));
    }
    Ok(())
}

/// Register a new customer account. Stays unverified until an
/// administrator approves the signup.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<UserRecord>, ApiError> {
    validate_signup(&req)?;

    let password_hash = hash_password(&req.password)?;
    let repo = UserRepository::new(state.pool.clone());

    let user = repo
        .create(CreateUser {
            email: req.email.trim().to_lowercase(),
            phone: req.phone.trim().to_string(),
            password_hash,
            name: req.name.trim().to_string(),
            role: UserRole::Customer.as_str().to_string(),
            address: req.address,
            bank_name: req.bank_name,
            account_number: req.account_number,
            account_holder: req.account_holder,
            ifsc_code: req.ifsc_code,
        })
        .await
        .map_err(|e| match e {
            DatabaseError::ConstraintViolation(_) => DomainError::Validation(
                "An account with this email, phone or account number already exists".to_string(),
            ),
            other => DomainError::from(other),
        })?;

    info!("New signup: {} ({})", user.email, user.id);
    Ok(Json(user))
}

/// Authenticate and issue a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let repo = UserRepository::new(state.pool.clone());
    let user = repo
        .get_by_email(&req.email.trim().to_lowercase())
        .await?
        .ok_or_else(|| DomainError::Unauthorized("Invalid email or password".to_string()))?;

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(DomainError::Unauthorized("Invalid email or password".to_string()).into());
    }

    // Customers must be approved by an administrator before first login.
    if user.role == UserRole::Customer.as_str() && !user.is_verified {
        return Err(
            DomainError::Forbidden("Account is pending verification".to_string()).into(),
        );
    }

    let (token, expires_in) = state.tokens.issue_token(&user)?;
    info!("Login: {} ({})", user.email, user.role);

    Ok(Json(AuthResponse {
        token,
        expires_in,
        user,
    }))
}

/// Current user's profile.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserRecord>, ApiError> {
    let repo = UserRepository::new(state.pool.clone());
    let user = repo
        .get(&claims.sub)
        .await?
        .ok_or_else(|| DomainError::not_found("user", &claims.sub))?;
    Ok(Json(user))
}

/// Update the current user's profile fields. Email, password and role
/// are not updatable here.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(changes): Json<UpdateUserProfile>,
) -> Result<Json<UserRecord>, ApiError> {
    let repo = UserRepository::new(state.pool.clone());
    let user = repo
        .update_profile(&claims.sub, changes)
        .await?
        .ok_or_else(|| DomainError::not_found("user", &claims.sub))?;
    Ok(Json(user))
}

/// Account dashboard: reconciled statement plus recent activity.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let users = UserRepository::new(state.pool.clone());
    let user = users
        .get(&claims.sub)
        .await?
        .ok_or_else(|| DomainError::not_found("user", &claims.sub))?;

    let snapshot = SnapshotRepository::new(state.pool.clone())
        .account_snapshot(&claims.sub)
        .await?;

    let statement = reconcile(
        &snapshot.transactions,
        &snapshot.orders,
        snapshot.loan.as_ref(),
    );

    let recent_transactions: Vec<TransactionRecord> = snapshot
        .transactions
        .iter()
        .filter(|t| balance_eligible(&t.kind, &t.status, t.verified))
        .take(5)
        .cloned()
        .collect();

    // Positions with a sell request in flight are no longer the
    // customer's to act on, so only OPEN orders are listed.
    let open_positions: Vec<OrderRecord> = snapshot
        .orders
        .iter()
        .filter(|o| o.status == TradeStatus::Open.as_str())
        .cloned()
        .collect();

    Ok(Json(DashboardResponse {
        user,
        statement,
        recent_transactions,
        open_positions,
    }))
}
