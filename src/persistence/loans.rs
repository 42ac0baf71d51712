//! Loan request repository
//!
//! One non-rejected request per user, enforced by a partial unique index
//! so the guard holds even under concurrent submissions.

use chrono::Utc;
use sqlx::Row;
use tracing::{debug, error};
use uuid::Uuid;

use super::models::{CreateLoanRequest, LoanRecord, Transition};
use super::{DatabaseError, DbPool};
use crate::domain::entities::loan::LoanStatus;

pub struct LoanRepository {
    pool: DbPool,
}

impl LoanRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// File a new PENDING loan request.
    ///
    /// Fails with a constraint violation while the user has any
    /// non-REJECTED request on file.
    pub async fn create(&self, input: CreateLoanRequest) -> Result<LoanRecord, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let record = sqlx::query_as::<_, LoanRecord>(
            r#"
            INSERT INTO loan_requests (id, user_id, amount, duration_months, status, created_at)
            VALUES (?1, ?2, ?3, ?4, 'PENDING', ?5)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&input.user_id)
        .bind(input.amount)
        .bind(input.duration_months)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create loan request: {}", e);
            DatabaseError::from_write("Failed to create loan request", e)
        })?;

        debug!(
            "Created loan request {} for user {} ({})",
            record.id, record.user_id, record.amount
        );
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<Option<LoanRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, LoanRecord>("SELECT * FROM loan_requests WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get loan request {}: {}", id, e);
                DatabaseError::QueryError(format!("Failed to get loan request: {}", e))
            })?;

        Ok(record)
    }

    /// The user's current (most recent) loan request, if any.
    pub async fn get_for_user(&self, user_id: &str) -> Result<Option<LoanRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, LoanRecord>(
            "SELECT * FROM loan_requests WHERE user_id = ?1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get loan request for user {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to get loan request: {}", e))
        })?;

        Ok(record)
    }

    /// All loan requests, newest first (admin review queue).
    pub async fn list_all(&self) -> Result<Vec<LoanRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, LoanRecord>(
            "SELECT * FROM loan_requests ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list loan requests: {}", e);
            DatabaseError::QueryError(format!("Failed to list loan requests: {}", e))
        })?;

        Ok(records)
    }

    /// Approve or reject a pending request.
    pub async fn decide(
        &self,
        id: &str,
        approve: bool,
    ) -> Result<Transition<LoanRecord>, DatabaseError> {
        let status = if approve {
            LoanStatus::Approved
        } else {
            LoanStatus::Rejected
        };
        let now = Utc::now();

        let updated = sqlx::query_as::<_, LoanRecord>(
            r#"
            UPDATE loan_requests
            SET status = ?1, decided_at = ?2
            WHERE id = ?3 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to decide loan request {}: {}", id, e);
            DatabaseError::QueryError(format!("Failed to decide loan request: {}", e))
        })?;

        if let Some(record) = updated {
            debug!("Loan request {} marked {}", id, record.status);
            return Ok(Transition::Applied(record));
        }

        let row = sqlx::query("SELECT status FROM loan_requests WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to inspect loan request: {}", e)))?;

        match row {
            None => Ok(Transition::NotFound),
            Some(row) => {
                let status: String = row.get("status");
                Ok(Transition::WrongState {
                    current: format!("loan request is already {}", status),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;

    async fn seed_user(pool: &DbPool, id: &str) {
        sqlx::query(
            "INSERT INTO users (id, email, phone, password_hash, name, role) \
             VALUES (?1, ?1 || '@b.c', ?1 || '-ph', 'h', 'A', 'customer')",
        )
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
    }

    fn request(user_id: &str, amount: f64) -> CreateLoanRequest {
        CreateLoanRequest {
            user_id: user_id.to_string(),
            amount,
            duration_months: 12,
        }
    }

    #[tokio::test]
    async fn test_second_active_request_rejected() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        seed_user(&pool, "u1").await;
        let repo = LoanRepository::new(pool);

        repo.create(request("u1", 5000.0)).await.unwrap();
        let second = repo.create(request("u1", 1000.0)).await;
        assert!(matches!(
            second,
            Err(DatabaseError::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_decide_approve_then_immutable() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        seed_user(&pool, "u1").await;
        let repo = LoanRepository::new(pool);

        let record = repo.create(request("u1", 5000.0)).await.unwrap();

        let first = repo.decide(&record.id, true).await.unwrap();
        match first {
            Transition::Applied(r) => {
                assert_eq!(r.status, "APPROVED");
                assert!(r.decided_at.is_some());
            }
            other => panic!("expected Applied, got {:?}", other),
        }

        let second = repo.decide(&record.id, false).await.unwrap();
        assert!(matches!(second, Transition::WrongState { .. }));
    }

    #[tokio::test]
    async fn test_rejection_frees_up_a_new_request() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        seed_user(&pool, "u1").await;
        let repo = LoanRepository::new(pool);

        let record = repo.create(request("u1", 5000.0)).await.unwrap();
        repo.decide(&record.id, false).await.unwrap();

        let fresh = repo.create(request("u1", 2000.0)).await;
        assert!(fresh.is_ok());

        // get_for_user returns the newest request
        let current = repo.get_for_user("u1").await.unwrap().unwrap();
        assert_eq!(current.amount, 2000.0);
        assert_eq!(current.status, "PENDING");
    }

    #[tokio::test]
    async fn test_decide_missing_request() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let repo = LoanRepository::new(pool);

        let outcome = repo.decide("nope", true).await.unwrap();
        assert!(matches!(outcome, Transition::NotFound));
    }
}
