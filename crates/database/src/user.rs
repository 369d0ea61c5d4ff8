//! User account operations.

use sqlx::SqlitePool;

use crate::error::{is_unique_violation, DatabaseError, Result};
use crate::models::User;

/// Create a new user with an already-hashed password.
///
/// Returns the stored row. A duplicate username maps to `AlreadyExists`.
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
    display_name: Option<&str>,
) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password_hash, display_name)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .bind(display_name)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            return DatabaseError::AlreadyExists {
                entity: "User",
                id: username.to_string(),
            };
        }
        DatabaseError::Sqlx(e)
    })?;

    get_user(pool, result.last_insert_rowid()).await
}

/// Get a user by id.
pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password_hash, display_name, created_at, updated_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "User",
        id: id.to_string(),
    })
}

/// Get a user by username.
pub async fn get_user_by_username(pool: &SqlitePool, username: &str) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password_hash, display_name, created_at, updated_at
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "User",
        id: username.to_string(),
    })
}

/// Update a user's display name.
pub async fn update_display_name(
    pool: &SqlitePool,
    id: i64,
    display_name: Option<&str>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET display_name = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(display_name)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Delete a user by id. Their messages go with them (cascade).
pub async fn delete_user(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    Ok(())
}
