//! Persistence Layer
//!
//! SQLite persistence for user accounts, transactions, trade orders,
//! loan requests and payment endpoints. Async access via sqlx.
//!
//! # Schema
//!
//! ## Users Table
//! - id: UUID
//! - email / phone / account_number: unique identity fields
//! - password_hash: bcrypt hash
//! - role: "admin" or "customer"
//! - is_verified: admin signup approval flag
//!
//! ## Transactions Table
//! - type: "DEPOSIT" or "WITHDRAW"
//! - status: "PENDING", "COMPLETED" or "FAILED"
//! - verified: deposit verification flag (admin-set)
//!
//! ## Orders Table
//! - type: "LONG" or "SHORT"
//! - status: "OPEN", "PENDING_SELL" or "CLOSED"
//! - profit_loss: populated exactly once, when the order is closed
//!
//! ## Loan Requests Table
//! - status: "PENDING", "APPROVED" or "REJECTED"
//! - at most one non-REJECTED request per user (partial unique index)

pub mod loans;
pub mod models;
pub mod orders;
pub mod payments;
pub mod snapshot;
pub mod transactions;
pub mod users;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl DatabaseError {
    /// Classify an sqlx error from a write, surfacing unique-index hits
    /// as constraint violations so callers can map them to conflicts.
    pub(crate) fn from_write(context: &str, e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return DatabaseError::ConstraintViolation(format!("{}: {}", context, db_err));
            }
        }
        DatabaseError::QueryError(format!("{}: {}", context, e))
    }
}

/// Initialize the database connection pool
///
/// # Arguments
/// - `database_url`: Path to SQLite database file (e.g., "sqlite://data/astex.db")
///
/// # Errors
/// Returns error if database connection fails or migrations fail
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", database_url);

    // Ensure data directory exists
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(std::time::Duration::from_secs(5))
        .log_statements(tracing::log::LevelFilter::Debug);

    // An in-memory SQLite database exists per connection, so the pool
    // must hold exactly one and never recycle it.
    let is_memory = database_url.contains(":memory:");
    let pool = SqlitePoolOptions::new()
        .max_connections(if is_memory { 1 } else { 5 })
        .idle_timeout(if is_memory {
            None
        } else {
            Some(std::time::Duration::from_secs(600))
        })
        .max_lifetime(if is_memory {
            None
        } else {
            Some(std::time::Duration::from_secs(1800))
        })
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            phone TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            name TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin', 'customer')),
            is_verified INTEGER NOT NULL DEFAULT 0,
            address TEXT,
            bank_name TEXT,
            account_number TEXT UNIQUE,
            account_holder TEXT,
            ifsc_code TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create users table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            reference TEXT NOT NULL UNIQUE,
            type TEXT NOT NULL CHECK(type IN ('DEPOSIT', 'WITHDRAW')),
            status TEXT NOT NULL CHECK(status IN ('PENDING', 'COMPLETED', 'FAILED')),
            verified INTEGER NOT NULL DEFAULT 0,
            amount REAL NOT NULL,
            currency TEXT NOT NULL DEFAULT 'INR',
            description TEXT,
            timestamp DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create transactions table: {}", e))
    })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            symbol TEXT NOT NULL,
            quantity REAL NOT NULL,
            buy_price REAL NOT NULL,
            sell_price REAL,
            trade_amount REAL NOT NULL,
            type TEXT NOT NULL CHECK(type IN ('LONG', 'SHORT')),
            status TEXT NOT NULL CHECK(status IN ('OPEN', 'PENDING_SELL', 'CLOSED')),
            profit_loss REAL,
            trade_date DATETIME NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create orders table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS loan_requests (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            amount REAL NOT NULL,
            duration_months INTEGER NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('PENDING', 'APPROVED', 'REJECTED')),
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            decided_at DATETIME,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create loan_requests table: {}", e))
    })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payment_endpoints (
            id TEXT PRIMARY KEY,
            upi_id TEXT NOT NULL,
            merchant_name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create payment_endpoints table: {}", e))
    })?;

    // One in-flight loan per user: REJECTED requests do not block a new one
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_loans_one_active \
         ON loan_requests(user_id) WHERE status != 'REJECTED'",
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions(status)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    info!("✓ Database migrations completed successfully");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_init() {
        let pool = init_database("sqlite::memory:").await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_migrations() {
        let pool = init_database("sqlite::memory:").await.unwrap();

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN \
             ('users', 'transactions', 'orders', 'loan_requests', 'payment_endpoints')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(result.0, 5);
    }

    #[tokio::test]
    async fn test_active_loan_index_blocks_second_request() {
        let pool = init_database("sqlite::memory:").await.unwrap();

        sqlx::query(
            "INSERT INTO users (id, email, phone, password_hash, name, role) \
             VALUES ('u1', 'a@b.c', '123', 'h', 'A', 'customer')",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO loan_requests (id, user_id, amount, duration_months, status) \
             VALUES ('l1', 'u1', 5000.0, 12, 'PENDING')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let second = sqlx::query(
            "INSERT INTO loan_requests (id, user_id, amount, duration_months, status) \
             VALUES ('l2', 'u1', 1000.0, 6, 'PENDING')",
        )
        .execute(&pool)
        .await;
        assert!(second.is_err());

        // A rejected request does not block a fresh one
        sqlx::query("UPDATE loan_requests SET status = 'REJECTED' WHERE id = 'l1'")
            .execute(&pool)
            .await
            .unwrap();

        let third = sqlx::query(
            "INSERT INTO loan_requests (id, user_id, amount, duration_months, status) \
             VALUES ('l3', 'u1', 1000.0, 6, 'PENDING')",
        )
        .execute(&pool)
        .await;
        assert!(third.is_ok());
    }
}
