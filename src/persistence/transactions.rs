//! Transaction repository
//!
//! Deposits and withdrawals, including the admin-only status
//! transitions. Every transition is a single conditional UPDATE keyed on
//! the expected prior state, so two racing approvals can never both win;
//! the losing request gets the current state back for its error message.

use chrono::Utc;
use sqlx::Row;
use tracing::{debug, error};
use uuid::Uuid;

use super::models::{CreateTransaction, TransactionRecord, Transition};
use super::{DatabaseError, DbPool};
use crate::domain::entities::transaction::{TransactionKind, TransactionStatus};

pub struct TransactionRepository {
    pool: DbPool,
}

impl TransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a new PENDING transaction (deposit or withdrawal request).
    pub async fn create(
        &self,
        input: CreateTransaction,
    ) -> Result<TransactionRecord, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let record = sqlx::query_as::<_, TransactionRecord>(
            r#"
            INSERT INTO transactions (id, user_id, reference, type, status, verified, amount, description, timestamp)
            VALUES (?1, ?2, ?3, ?4, 'PENDING', 0, ?5, ?6, ?7)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&input.user_id)
        .bind(&input.reference)
        .bind(&input.kind)
        .bind(input.amount)
        .bind(&input.description)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create transaction: {}", e);
            DatabaseError::from_write("Failed to create transaction", e)
        })?;

        debug!(
            "Created {} transaction {} for user {}",
            record.kind, record.id, record.user_id
        );
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<Option<TransactionRecord>, DatabaseError> {
        let record =
            sqlx::query_as::<_, TransactionRecord>("SELECT * FROM transactions WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    error!("Failed to get transaction {}: {}", id, e);
                    DatabaseError::QueryError(format!("Failed to get transaction: {}", e))
                })?;

        Ok(record)
    }

    /// Transactions for one user, newest first.
    pub async fn list_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<TransactionRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, TransactionRecord>(
            "SELECT * FROM transactions WHERE user_id = ?1 ORDER BY timestamp DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list transactions for user {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to list transactions: {}", e))
        })?;

        Ok(records)
    }

    /// All transactions, newest first (admin review queue).
    pub async fn list_all(&self) -> Result<Vec<TransactionRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, TransactionRecord>(
            "SELECT * FROM transactions ORDER BY timestamp DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list transactions: {}", e);
            DatabaseError::QueryError(format!("Failed to list transactions: {}", e))
        })?;

        Ok(records)
    }

    /// Verify or fail a pending deposit.
    ///
    /// Approval marks it COMPLETED + verified, which is the sole path by
    /// which a deposit becomes balance-eligible. Terminal states are
    /// immutable: re-verifying a decided deposit reports the current
    /// state instead of overwriting it.
    pub async fn verify_deposit(
        &self,
        id: &str,
        approve: bool,
    ) -> Result<Transition<TransactionRecord>, DatabaseError> {
        let status = if approve {
            TransactionStatus::Completed
        } else {
            TransactionStatus::Failed
        };

        let updated = sqlx::query_as::<_, TransactionRecord>(
            r#"
            UPDATE transactions
            SET status = ?1, verified = ?2
            WHERE id = ?3 AND type = 'DEPOSIT' AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(status.as_str())
        .bind(approve)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to verify deposit {}: {}", id, e);
            DatabaseError::QueryError(format!("Failed to verify deposit: {}", e))
        })?;

        if let Some(record) = updated {
            debug!("Deposit {} marked {}", id, record.status);
            return Ok(Transition::Applied(record));
        }

        self.explain_failed_transition(id, TransactionKind::Deposit)
            .await
    }

    /// Approve or reject a pending withdrawal.
    pub async fn decide_withdrawal(
        &self,
        id: &str,
        approve: bool,
    ) -> Result<Transition<TransactionRecord>, DatabaseError> {
        let status = if approve {
            TransactionStatus::Completed
        } else {
            TransactionStatus::Failed
        };

        let updated = sqlx::query_as::<_, TransactionRecord>(
            r#"
            UPDATE transactions
            SET status = ?1
            WHERE id = ?2 AND type = 'WITHDRAW' AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to decide withdrawal {}: {}", id, e);
            DatabaseError::QueryError(format!("Failed to decide withdrawal: {}", e))
        })?;

        if let Some(record) = updated {
            debug!("Withdrawal {} marked {}", id, record.status);
            return Ok(Transition::Applied(record));
        }

        self.explain_failed_transition(id, TransactionKind::Withdraw)
            .await
    }

    /// The conditional UPDATE touched no row; work out why.
    async fn explain_failed_transition(
        &self,
        id: &str,
        expected_kind: TransactionKind,
    ) -> Result<Transition<TransactionRecord>, DatabaseError> {
        let row = sqlx::query("SELECT type, status FROM transactions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to inspect transaction: {}", e)))?;

        match row {
            None => Ok(Transition::NotFound),
            Some(row) => {
                let kind: String = row.get("type");
                let status: String = row.get("status");
                if kind != expected_kind.as_str() {
                    Ok(Transition::WrongState {
                        current: format!("transaction is a {}, not a {}", kind, expected_kind),
                    })
                } else {
                    Ok(Transition::WrongState {
                        current: format!("transaction is already {}", status),
                    })
                }
            }
        }
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

    fn deposit(user_id: &str, amount: f64) -> CreateTransaction {
        CreateTransaction {
            user_id: user_id.to_string(),
            reference: format!("DEP{}", Uuid::new_v4().simple()),
            kind: "DEPOSIT".to_string(),
            amount,
            description: None,
        }
    }

    fn withdrawal(user_id: &str, amount: f64) -> CreateTransaction {
        CreateTransaction {
            user_id: user_id.to_string(),
            reference: format!("WDL{}", Uuid::new_v4().simple()),
            kind: "WITHDRAW".to_string(),
            amount,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending_unverified() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user_id = seed_user(&pool).await;
        let repo = TransactionRepository::new(pool);

        let record = repo.create(deposit(&user_id, 500.0)).await.unwrap();
        assert_eq!(record.status, "PENDING");
        assert!(!record.verified);
        assert_eq!(record.amount, 500.0);
    }

    #[tokio::test]
    async fn test_verify_deposit_approve_and_terminal_immutability() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user_id = seed_user(&pool).await;
        let repo = TransactionRepository::new(pool);

        let record = repo.create(deposit(&user_id, 500.0)).await.unwrap();

        let outcome = repo.verify_deposit(&record.id, true).await.unwrap();
        let updated = match outcome {
            Transition::Applied(r) => r,
            other => panic!("expected Applied, got {:?}", other),
        };
        assert_eq!(updated.status, "COMPLETED");
        assert!(updated.verified);

        // Second verification cannot overwrite the decision
        let again = repo.verify_deposit(&record.id, false).await.unwrap();
        assert!(matches!(again, Transition::WrongState { .. }));

        let current = repo.get(&record.id).await.unwrap().unwrap();
        assert_eq!(current.status, "COMPLETED");
        assert!(current.verified);
    }

    #[tokio::test]
    async fn test_verify_deposit_reject_marks_failed() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user_id = seed_user(&pool).await;
        let repo = TransactionRepository::new(pool);

        let record = repo.create(deposit(&user_id, 500.0)).await.unwrap();
        let outcome = repo.verify_deposit(&record.id, false).await.unwrap();
        match outcome {
            Transition::Applied(r) => {
                assert_eq!(r.status, "FAILED");
                assert!(!r.verified);
            }
            other => panic!("expected Applied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_verify_rejects_wrong_kind_and_missing() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user_id = seed_user(&pool).await;
        let repo = TransactionRepository::new(pool);

        let wd = repo.create(withdrawal(&user_id, 100.0)).await.unwrap();
        let outcome = repo.verify_deposit(&wd.id, true).await.unwrap();
        assert!(matches!(outcome, Transition::WrongState { .. }));

        let missing = repo.verify_deposit("nope", true).await.unwrap();
        assert!(matches!(missing, Transition::NotFound));
    }

    #[tokio::test]
    async fn test_decide_withdrawal_once() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let user_id = seed_user(&pool).await;
        let repo = TransactionRepository::new(pool);

        let wd = repo.create(withdrawal(&user_id, 100.0)).await.unwrap();

        let first = repo.decide_withdrawal(&wd.id, true).await.unwrap();
        assert!(matches!(first, Transition::Applied(_)));

        let second = repo.decide_withdrawal(&wd.id, true).await.unwrap();
        assert!(matches!(second, Transition::WrongState { .. }));
    }
}
