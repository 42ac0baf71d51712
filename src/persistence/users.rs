//! User repository
//!
//! Account storage, signup duplicate checks, admin verification and the
//! cascading delete used when an admin removes a customer.

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::models::{CreateUser, UpdateUserProfile, UserRecord};
use super::{DatabaseError, DbPool};

pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new account.
    pub async fn create(&self, input: CreateUser) -> Result<UserRecord, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (
                id, email, phone, password_hash, name, role, is_verified,
                address, bank_name, account_number, account_holder, ifsc_code,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.password_hash)
        .bind(&input.name)
        .bind(&input.role)
        .bind(&input.address)
        .bind(&input.bank_name)
        .bind(&input.account_number)
        .bind(&input.account_holder)
        .bind(&input.ifsc_code)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create user: {}", e);
            DatabaseError::from_write("Failed to create user", e)
        })?;

        debug!("Created user {} ({})", record.id, record.email);
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get user {}: {}", id, e);
                DatabaseError::QueryError(format!("Failed to get user: {}", e))
            })?;

        Ok(record)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get user by email: {}", e);
                DatabaseError::QueryError(format!("Failed to get user: {}", e))
            })?;

        Ok(record)
    }

    /// All users, newest first (admin listing).
    pub async fn list_all(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let records =
            sqlx::query_as::<_, UserRecord>("SELECT * FROM users ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    error!("Failed to list users: {}", e);
                    DatabaseError::QueryError(format!("Failed to list users: {}", e))
                })?;

        Ok(records)
    }

    /// Admin approval of a new signup.
    pub async fn mark_verified(&self, id: &str) -> Result<bool, DatabaseError> {
        let now = Utc::now();
        let rows_affected = sqlx::query("UPDATE users SET is_verified = 1, updated_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to verify user {}: {}", id, e);
                DatabaseError::QueryError(format!("Failed to verify user: {}", e))
            })?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    /// Update profile and banking details. Identity fields not supplied
    /// stay untouched.
    pub async fn update_profile(
        &self,
        id: &str,
        update: UpdateUserProfile,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            UPDATE users
            SET name = COALESCE(?1, name),
                phone = COALESCE(?2, phone),
                address = COALESCE(?3, address),
                bank_name = COALESCE(?4, bank_name),
                account_number = COALESCE(?5, account_number),
                account_holder = COALESCE(?6, account_holder),
                ifsc_code = COALESCE(?7, ifsc_code),
                updated_at = ?8
            WHERE id = ?9
            RETURNING *
            "#,
        )
        .bind(&update.name)
        .bind(&update.phone)
        .bind(&update.address)
        .bind(&update.bank_name)
        .bind(&update.account_number)
        .bind(&update.account_holder)
        .bind(&update.ifsc_code)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to update user {}: {}", id, e);
            DatabaseError::from_write("Failed to update user", e)
        })?;

        Ok(record)
    }

    /// Remove a user and every record they own, in one transaction.
    pub async fn delete_cascading(&self, id: &str) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DatabaseError::QueryError(format!("Failed to begin delete transaction: {}", e))
        })?;

        for table in ["transactions", "orders", "loan_requests"] {
            sqlx::query(&format!("DELETE FROM {} WHERE user_id = ?1", table))
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Failed to delete {} for user {}: {}", table, id, e);
                    DatabaseError::QueryError(format!("Failed to delete user records: {}", e))
                })?;
        }

        let rows_affected = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to delete user {}: {}", id, e);
                DatabaseError::QueryError(format!("Failed to delete user: {}", e))
            })?
            .rows_affected();

        tx.commit().await.map_err(|e| {
            DatabaseError::QueryError(format!("Failed to commit delete transaction: {}", e))
        })?;

        if rows_affected > 0 {
            info!("Deleted user {} and owned records", id);
        }
        Ok(rows_affected > 0)
    }

    /// Seed a default administrator account on first start so the
    /// back-office is reachable before any operator exists.
    pub async fn seed_default_admin(&self, password_hash: &str) -> Result<(), DatabaseError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    DatabaseError::QueryError(format!("Failed to check for admin users: {}", e))
                })?;

        if count > 0 {
            return Ok(());
        }

        self.create(CreateUser {
            email: "admin@astex.local".to_string(),
            phone: "0000000000".to_string(),
            password_hash: password_hash.to_string(),
            name: "Administrator".to_string(),
            role: "admin".to_string(),
            address: None,
            bank_name: None,
            account_number: None,
            account_holder: None,
            ifsc_code: None,
        })
        .await?;

        info!("🔐 Default admin user created (email: admin@astex.local)");
        warn!("⚠️  CHANGE DEFAULT ADMIN PASSWORD IN PRODUCTION!");
        Ok(())
    }
}
