use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

pub struct UserRepository;

fn map_unique(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Email or username already in use".to_string())
    } else {
        AppError::Database(err)
    }
}

impl UserRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER(?)")
            .bind(email)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_username(pool: &SqlitePool, username: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(username) = LOWER(?)")
            .bind(username)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Look an account up by email or username, whichever `login` looks like.
    pub async fn find_by_login(pool: &SqlitePool, login: &str) -> AppResult<Option<User>> {
        let login = login.trim();
        if login.contains('@') {
            Self::find_by_email(pool, login).await
        } else {
            Self::find_by_username(pool, login).await
        }
    }

    pub async fn create(pool: &SqlitePool, data: CreateUser) -> AppResult<User> {
        let mut tx = pool.begin().await?;
        let user = Self::create_in(&mut tx, data).await?;
        tx.commit().await?;
        Ok(user)
    }

    /// Insert an account inside a caller-owned transaction.
    pub async fn create_in(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        data: CreateUser,
    ) -> AppResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, email, username, password_hash, display_name, is_admin, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(data.email.trim().to_lowercase())
        .bind(data.username.trim())
        .bind(&data.password_hash)
        .bind(&data.display_name)
        .bind(now)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_unique)
    }

    pub async fn update(pool: &SqlitePool, id: &str, data: UpdateUser) -> AppResult<User> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                email = COALESCE(?, email),
                username = COALESCE(?, username),
                password_hash = COALESCE(?, password_hash),
                display_name = COALESCE(?, display_name),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(data.email.map(|e| e.trim().to_lowercase()))
        .bind(data.username.map(|u| u.trim().to_string()))
        .bind(data.password_hash)
        .bind(data.display_name)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(map_unique)?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Delete an account and, through foreign-key cascades, its pets and every
    /// record hanging off them. Refused while other accounts are linked to it
    /// as sub-users.
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<()> {
        let mut tx = pool.begin().await?;

        let children: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sub_users WHERE parent_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if children > 0 {
            return Err(AppError::Conflict(
                "Remove all sub-users before deleting this account".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::Conflict(
                        "Remove all sub-users before deleting this account".to_string(),
                    )
                } else {
                    AppError::Database(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tx.commit().await?;
        Ok(())
    }
}
