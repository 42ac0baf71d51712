//! Trade entry and sell requests.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::application::handlers::{resolve, ApiError};
use crate::application::AppState;
use crate::auth::Claims;
use crate::domain::entities::order::TradeKind;
use crate::domain::errors::{validate_amount, DomainError};
use crate::persistence::models::{CreateOrder, OrderRecord};
use crate::persistence::orders::OrderRepository;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub symbol: String,
    pub quantity: f64,
    pub buy_price: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub trade_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SellRequest {
    pub sell_price: f64,
}

/// Own orders, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<OrderRecord>>, ApiError> {
    let repo = OrderRepository::new(state.pool.clone());
    let records = repo.list_for_user(&claims.sub).await?;
    Ok(Json(records))
}

/// Record a trade entry. The position opens immediately.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<OrderRecord>, ApiError> {
    if req.symbol.trim().is_empty() {
        return Err(DomainError::Validation("Symbol is required".to_string()).into());
    }
    let quantity = validate_amount(req.quantity)?;
    let buy_price = validate_amount(req.buy_price)?;

    let kind = TradeKind::parse(&req.kind.to_uppercase()).ok_or_else(|| {
        DomainError::Validation(format!("Unknown trade type: {}", req.kind))
    })?;

    let repo = OrderRepository::new(state.pool.clone());
    let record = repo
        .create(CreateOrder {
            user_id: claims.sub.clone(),
            symbol: req.symbol.trim().to_uppercase(),
            quantity,
            buy_price,
            kind: kind.as_str().to_string(),
            trade_date: req.trade_date.unwrap_or_else(Utc::now),
        })
        .await?;

    info!(
        "Order {} opened by {}: {} {} x{} @ {}",
        record.id, claims.sub, record.kind, record.symbol, record.quantity, record.buy_price
    );
    Ok(Json(record))
}

/// Ask to close a position at a price. The order moves to PENDING_SELL
/// and waits for an administrator to settle it.
pub async fn request_sell(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<SellRequest>,
) -> Result<Json<OrderRecord>, ApiError> {
    let sell_price = validate_amount(req.sell_price)?;

    let repo = OrderRepository::new(state.pool.clone());
    let outcome = repo.request_sell(&id, &claims.sub, sell_price).await?;
    let record = resolve(outcome, "order", &id)?;

    info!(
        "Sell requested on order {} by {} at {}",
        record.id, claims.sub, sell_price
    );
    Ok(Json(record))
}
