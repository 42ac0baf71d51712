//! Consistent account snapshot
//!
//! The reconciler must see one point-in-time view of a user's records:
//! summing deposits before and withdrawals after a concurrent admin
//! approval would show a balance that matches no transaction list the
//! user can ever see. All rows are therefore fetched inside a single
//! read transaction.

use tracing::error;

use super::models::{LoanRecord, OrderRecord, TransactionRecord};
use super::{DatabaseError, DbPool};

/// One point-in-time view of everything the reconciler consumes.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub transactions: Vec<TransactionRecord>,
    pub orders: Vec<OrderRecord>,
    pub loan: Option<LoanRecord>,
}

pub struct SnapshotRepository {
    pool: DbPool,
}

impl SnapshotRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fetch the user's transactions, orders and loan request in one
    /// read transaction.
    pub async fn account_snapshot(&self, user_id: &str) -> Result<AccountSnapshot, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin snapshot transaction: {}", e);
            DatabaseError::QueryError(format!("Failed to begin snapshot: {}", e))
        })?;

        let transactions = sqlx::query_as::<_, TransactionRecord>(
            "SELECT * FROM transactions WHERE user_id = ?1 ORDER BY timestamp DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to snapshot transactions for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to snapshot transactions: {}", e))
        })?;

        let orders = sqlx::query_as::<_, OrderRecord>(
            "SELECT * FROM orders WHERE user_id = ?1 ORDER BY trade_date DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to snapshot orders for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to snapshot orders: {}", e))
        })?;

        let loan = sqlx::query_as::<_, LoanRecord>(
            "SELECT * FROM loan_requests WHERE user_id = ?1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to snapshot loan for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to snapshot loan: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            DatabaseError::QueryError(format!("Failed to commit snapshot: {}", e))
        })?;

        Ok(AccountSnapshot {
            transactions,
            orders,
            loan,
        })
    }
}
