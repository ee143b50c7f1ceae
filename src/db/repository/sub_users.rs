use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Sub-user Link Repository
// ============================================================================

pub struct SubUserRepository;

impl SubUserRepository {
    /// The link in which `user_id` is the sub-user, if any.
    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Option<SubUserLink>> {
        sqlx::query_as::<_, SubUserLink>("SELECT * FROM sub_users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Parent account of `user_id`, joined with the link role.
    pub async fn find_parent(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Option<LinkedAccount>> {
        sqlx::query_as::<_, LinkedAccount>(
            r#"
            SELECT
                u.id AS user_id, u.email, u.username, u.display_name,
                s.role, s.created_at AS linked_at
            FROM sub_users s
            JOIN users u ON u.id = s.parent_id
            WHERE s.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_children(
        pool: &SqlitePool,
        parent_id: &str,
    ) -> AppResult<Vec<LinkedAccount>> {
        sqlx::query_as::<_, LinkedAccount>(
            r#"
            SELECT
                u.id AS user_id, u.email, u.username, u.display_name,
                s.role, s.created_at AS linked_at
            FROM sub_users s
            JOIN users u ON u.id = s.user_id
            WHERE s.parent_id = ?
            ORDER BY s.created_at ASC
            "#,
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn count_children(pool: &SqlitePool, parent_id: &str) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM sub_users WHERE parent_id = ?")
            .bind(parent_id)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn create(
        pool: &SqlitePool,
        parent_id: &str,
        user_id: &str,
        role: Role,
    ) -> AppResult<SubUserLink> {
        let mut tx = pool.begin().await?;
        let link = Self::create_in(&mut tx, parent_id, user_id, role).await?;
        tx.commit().await?;
        Ok(link)
    }

    /// Insert a link inside a caller-owned transaction. The unique `user_id`
    /// column guarantees an account has at most one parent.
    pub async fn create_in(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        parent_id: &str,
        user_id: &str,
        role: Role,
    ) -> AppResult<SubUserLink> {
        if parent_id == user_id {
            return Err(AppError::BadRequest(
                "An account cannot be its own sub-user".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, SubUserLink>(
            r#"
            INSERT INTO sub_users (id, parent_id, user_id, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(parent_id)
        .bind(user_id)
        .bind(role)
        .bind(now)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Account is already linked as a sub-user".to_string())
            } else {
                AppError::Database(e)
            }
        })
    }

    pub async fn update_role(
        pool: &SqlitePool,
        parent_id: &str,
        user_id: &str,
        role: Role,
    ) -> AppResult<Option<SubUserLink>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, SubUserLink>(
            r#"
            UPDATE sub_users SET role = ?, updated_at = ?
            WHERE parent_id = ? AND user_id = ?
            RETURNING *
            "#,
        )
        .bind(role)
        .bind(now)
        .bind(parent_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Remove the link for `user_id`. The account itself is left untouched.
    /// Returns whether a link existed.
    pub async fn delete_by_user_id(pool: &SqlitePool, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM sub_users WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
