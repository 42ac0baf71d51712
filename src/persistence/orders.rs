//! Order repository
//!
//! Trade positions and the OPEN → PENDING_SELL → CLOSED lifecycle.
//! Settlement computes realized profit/loss inside a single conditional
//! UPDATE so the check and the write cannot be separated by a concurrent
//! request; a re-close finds the order already CLOSED and loses cleanly.

use chrono::Utc;
use sqlx::Row;
use tracing::{debug, error};
use uuid::Uuid;

use super::models::{CreateOrder, OrderRecord, Transition};
use super::{DatabaseError, DbPool};

pub struct OrderRepository {
    pool: DbPool,
}

impl OrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a trade entry as an OPEN position.
    pub async fn create(&self, input: CreateOrder) -> Result<OrderRecord, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let trade_amount = input.buy_price * input.quantity;
        let record = sqlx::query_as::<_, OrderRecord>(
            r#"
            INSERT INTO orders (
                id, user_id, symbol, quantity, buy_price, sell_price,
                trade_amount, type, status, profit_loss, trade_date,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, 'OPEN', NULL, ?8, ?9, ?9)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&input.user_id)
        .bind(&input.symbol)
        .bind(input.quantity)
        .bind(input.buy_price)
        .bind(trade_amount)
        .bind(&input.kind)
        .bind(input.trade_date)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create order: {}", e);
            DatabaseError::from_write("Failed to create order", e)
        })?;

        debug!("Created order {} ({})", record.id, record.symbol);
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<Option<OrderRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get order {}: {}", id, e);
                DatabaseError::QueryError(format!("Failed to get order: {}", e))
            })?;

        Ok(record)
    }

    /// Orders for one user, newest trade first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<OrderRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, OrderRecord>(
            "SELECT * FROM orders WHERE user_id = ?1 ORDER BY trade_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list orders for user {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to list orders: {}", e))
        })?;

        Ok(records)
    }

    /// All orders, newest first (admin settlement queue).
    pub async fn list_all(&self) -> Result<Vec<OrderRecord>, DatabaseError> {
        let records =
            sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders ORDER BY trade_date DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    error!("Failed to list orders: {}", e);
                    DatabaseError::QueryError(format!("Failed to list orders: {}", e))
                })?;

        Ok(records)
    }

    /// Customer requests to exit an OPEN position at the given price.
    ///
    /// Scoped to the owning user so one customer cannot move another's
    /// position into the settlement queue.
    pub async fn request_sell(
        &self,
        id: &str,
        user_id: &str,
        sell_price: f64,
    ) -> Result<Transition<OrderRecord>, DatabaseError> {
        let now = Utc::now();
        let updated = sqlx::query_as::<_, OrderRecord>(
            r#"
            UPDATE orders
            SET status = 'PENDING_SELL', sell_price = ?1, updated_at = ?2
            WHERE id = ?3 AND user_id = ?4 AND status = 'OPEN'
            RETURNING *
            "#,
        )
        .bind(sell_price)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to request sell for order {}: {}", id, e);
            DatabaseError::QueryError(format!("Failed to request sell: {}", e))
        })?;

        if let Some(record) = updated {
            debug!("Order {} moved to PENDING_SELL", id);
            return Ok(Transition::Applied(record));
        }

        let row = sqlx::query("SELECT status FROM orders WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to inspect order: {}", e)))?;

        match row {
            None => Ok(Transition::NotFound),
            Some(row) => {
                let status: String = row.get("status");
                Ok(Transition::WrongState {
                    current: format!("order is {}", status),
                })
            }
        }
    }

    /// Settle a pending sell: close the order and finalize profit/loss.
    ///
    /// Profit/loss is computed in the UPDATE itself from the stored type,
    /// prices and quantity, keyed on status = PENDING_SELL, so settlement
    /// happens exactly once. The formula mirrors
    /// `domain::entities::order::settlement_profit_loss`.
    pub async fn settle(&self, id: &str) -> Result<Transition<OrderRecord>, DatabaseError> {
        let now = Utc::now();
        let updated = sqlx::query_as::<_, OrderRecord>(
            r#"
            UPDATE orders
            SET status = 'CLOSED',
                profit_loss = CASE type
                    WHEN 'LONG' THEN (sell_price - buy_price) * quantity
                    ELSE (buy_price - sell_price) * quantity
                END,
                updated_at = ?1
            WHERE id = ?2 AND status = 'PENDING_SELL' AND sell_price IS NOT NULL
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to settle order {}: {}", id, e);
            DatabaseError::QueryError(format!("Failed to settle order: {}", e))
        })?;

        if let Some(record) = updated {
            debug!(
                "Settled order {}: profit_loss = {:?}",
                id, record.profit_loss
            );
            return Ok(Transition::Applied(record));
        }

        let row = sqlx::query("SELECT status, sell_price FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to inspect order: {}", e)))?;

        match row {
            None => Ok(Transition::NotFound),
            Some(row) => {
                let status: String = row.get("status");
                let sell_price: Option<f64> = row.get("sell_price");
                if status == "PENDING_SELL" && sell_price.is_none() {
                    Ok(Transition::Invalid(
                        "order has no sell price recorded".to_string(),
                    ))
                } else {
                    Ok(Transition::WrongState {
                        current: format!("order is {}", status),
                    })
                }
            }
        }
    }

    /// Force-delete an order (admin bookkeeping correction).
    pub async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let rows_affected = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to delete order {}: {}", id, e);
                DatabaseError::QueryError(format!("Failed to delete order: {}", e))
            })?
            .rows_affected();

        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;

    async fn seed_user(pool: &DbPool) -> String {
        sqlx::query(
            "INSERT INTO users (id, email, phone, password_hash, name, role) \
             VALUES ('u1', 'a@b.c', '100', 'h', 'A', 'customer')",
        )
        .execute(pool)
        .await
        .unwrap();
        "u1".to_string()
    }

    fn long_order(user_id: &str, buy_price: f64, quantity: f64) -> CreateOrder {
        CreateOrder {
            user_id: user_id.to_string(),
            symbol: "EURUSD".to_string(),
            quantity,
            buy_price,
            kind: "LONG".to_string(),
            trade_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_open_order_has_no_profit_loss() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user_id = seed_user(&pool).await;
        let repo = OrderRepository::new(pool);

        let record = repo.create(long_order(&user_id, 50.0, 5.0)).await.unwrap();
        assert_eq!(record.status, "OPEN");
        assert!(record.profit_loss.is_none());
        assert!(record.sell_price.is_none());
        assert_eq!(record.trade_amount, 250.0);
    }

    #[tokio::test]
    async fn test_full_lifecycle_long() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user_id = seed_user(&pool).await;
        let repo = OrderRepository::new(pool);

        let record = repo.create(long_order(&user_id, 50.0, 5.0)).await.unwrap();

        let pending = repo.request_sell(&record.id, &user_id, 60.0).await.unwrap();
        let pending = match pending {
            Transition::Applied(r) => r,
            other => panic!("expected Applied, got {:?}", other),
        };
        assert_eq!(pending.status, "PENDING_SELL");
        assert_eq!(pending.sell_price, Some(60.0));

        let closed = repo.settle(&record.id).await.unwrap();
        let closed = match closed {
            Transition::Applied(r) => r,
            other => panic!("expected Applied, got {:?}", other),
        };
        assert_eq!(closed.status, "CLOSED");
        // (60 - 50) * 5
        assert_eq!(closed.profit_loss, Some(50.0));
    }

    #[tokio::test]
    async fn test_settle_short_computes_inverted_profit() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user_id = seed_user(&pool).await;
        let repo = OrderRepository::new(pool);

        let record = repo
            .create(CreateOrder {
                user_id: user_id.clone(),
                symbol: "GBPUSD".to_string(),
                quantity: 10.0,
                buy_price: 100.0,
                kind: "SHORT".to_string(),
                trade_date: Utc::now(),
            })
            .await
            .unwrap();

        match repo.request_sell(&record.id, &user_id, 80.0).await.unwrap() {
            Transition::Applied(_) => {}
            other => panic!("expected Applied, got {:?}", other),
        }

        match repo.settle(&record.id).await.unwrap() {
            // (100 - 80) * 10
            Transition::Applied(r) => assert_eq!(r.profit_loss, Some(200.0)),
            other => panic!("expected Applied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_settle_twice_fails_without_mutation() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user_id = seed_user(&pool).await;
        let repo = OrderRepository::new(pool);

        let record = repo.create(long_order(&user_id, 50.0, 5.0)).await.unwrap();
        repo.request_sell(&record.id, &user_id, 60.0).await.unwrap();
        repo.settle(&record.id).await.unwrap();

        let again = repo.settle(&record.id).await.unwrap();
        assert!(matches!(again, Transition::WrongState { .. }));

        // The failed retry must not have touched the settled values
        let current = repo.get(&record.id).await.unwrap().unwrap();
        assert_eq!(current.status, "CLOSED");
        assert_eq!(current.profit_loss, Some(50.0));
    }

    #[tokio::test]
    async fn test_settle_open_order_rejected() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user_id = seed_user(&pool).await;
        let repo = OrderRepository::new(pool);

        let record = repo.create(long_order(&user_id, 50.0, 5.0)).await.unwrap();
        let outcome = repo.settle(&record.id).await.unwrap();
        assert!(matches!(outcome, Transition::WrongState { .. }));
    }

    #[tokio::test]
    async fn test_request_sell_wrong_owner_reads_as_missing() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user_id = seed_user(&pool).await;
        let repo = OrderRepository::new(pool);

        let record = repo.create(long_order(&user_id, 50.0, 5.0)).await.unwrap();
        let outcome = repo.request_sell(&record.id, "someone-else", 60.0).await.unwrap();
        assert!(matches!(outcome, Transition::NotFound));
    }

    #[tokio::test]
    async fn test_settle_missing_order() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let repo = OrderRepository::new(pool);

        let outcome = repo.settle("nope").await.unwrap();
        assert!(matches!(outcome, Transition::NotFound));
    }
}
