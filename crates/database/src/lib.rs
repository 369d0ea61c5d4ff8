//! SQLite persistence layer for SMSVault.
//!
//! This crate provides async database operations for user accounts and
//! their synchronized SMS messages using SQLx with SQLite, and implements
//! the `sync-core` storage traits so a [`Database`] can back the
//! reconciliation fold directly.
//!
//! # Example
//!
//! ```no_run
//! use database::{user, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:smsvault.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let bob = user::create_user(db.pool(), "bob", "$pbkdf2-sha256$...", None).await?;
//!     println!("registered user {}", bob.id);
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod message;
pub mod models;
pub mod sync;
pub mod user;

pub use error::{DatabaseError, Result};
pub use message::{ListFilter, MAX_PAGE_SIZE};
pub use models::{AddressCount, DayCount, Message, MessageStats, TypeCount, User};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    /// Sized for concurrent bulk-sync requests; each request holds at most
    /// one connection per item write.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `sqlite::memory:` for tests.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// In-memory database on a single connection, so the migrated schema
    /// is visible to every query in the test.
    pub async fn test_db() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();
        db
    }

    /// Insert a user with a throwaway hash and return its id.
    pub async fn seed_user(pool: &SqlitePool, username: &str) -> i64 {
        crate::user::create_user(pool, username, "$pbkdf2-sha256$test$hash", None)
            .await
            .unwrap()
            .id
    }
}
