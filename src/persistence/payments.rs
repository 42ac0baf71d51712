//! Payment endpoint repository
//!
//! UPI endpoints customers pay deposits into. Exactly one endpoint is
//! active at a time; replacing it deactivates the previous one in the
//! same transaction.

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use super::{DatabaseError, DbPool};
use crate::persistence::models::PaymentEndpointRecord;

pub struct PaymentEndpointRepository {
    pool: DbPool,
}

impl PaymentEndpointRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The endpoint deposits should currently be paid into.
    pub async fn get_active(&self) -> Result<Option<PaymentEndpointRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, PaymentEndpointRecord>(
            "SELECT * FROM payment_endpoints WHERE is_active = 1 ORDER BY updated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get active payment endpoint: {}", e);
            DatabaseError::QueryError(format!("Failed to get payment endpoint: {}", e))
        })?;

        Ok(record)
    }

    /// Replace the active UPI endpoint.
    pub async fn replace_active(
        &self,
        upi_id: &str,
        merchant_name: &str,
    ) -> Result<PaymentEndpointRecord, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(|e| {
            DatabaseError::QueryError(format!("Failed to begin endpoint transaction: {}", e))
        })?;

        sqlx::query("UPDATE payment_endpoints SET is_active = 0, updated_at = ?1 WHERE is_active = 1")
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to deactivate payment endpoints: {}", e);
                DatabaseError::QueryError(format!("Failed to deactivate endpoints: {}", e))
            })?;

        let record = sqlx::query_as::<_, PaymentEndpointRecord>(
            r#"
            INSERT INTO payment_endpoints (id, upi_id, merchant_name, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, 1, ?4, ?4)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(upi_id)
        .bind(merchant_name)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to create payment endpoint: {}", e);
            DatabaseError::QueryError(format!("Failed to create payment endpoint: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            DatabaseError::QueryError(format!("Failed to commit endpoint transaction: {}", e))
        })?;

        info!("Active UPI endpoint replaced: {}", record.upi_id);
        Ok(record)
    }
}
