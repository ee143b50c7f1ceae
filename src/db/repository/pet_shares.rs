use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Pet Share Repository
// ============================================================================

pub struct PetShareRepository;

impl PetShareRepository {
    pub async fn find(
        pool: &SqlitePool,
        pet_id: &str,
        user_id: &str,
    ) -> AppResult<Option<PetShare>> {
        sqlx::query_as::<_, PetShare>("SELECT * FROM pet_shares WHERE pet_id = ? AND user_id = ?")
            .bind(pet_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn exists(pool: &SqlitePool, pet_id: &str, user_id: &str) -> AppResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM pet_shares WHERE pet_id = ? AND user_id = ? LIMIT 1")
                .bind(pet_id)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .map_err(AppError::Database)?;

        Ok(found.is_some())
    }

    /// Insert a grant unless `(pet_id, user_id)` already has one.
    ///
    /// The check and the write are a single statement backed by the UNIQUE
    /// constraint, so concurrent callers can never produce two rows. Returns
    /// `None` when the grant already existed.
    pub async fn create_if_absent(
        pool: &SqlitePool,
        pet_id: &str,
        user_id: &str,
        role: Role,
    ) -> AppResult<Option<PetShare>> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, PetShare>(
            r#"
            INSERT INTO pet_shares (id, pet_id, user_id, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (pet_id, user_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(pet_id)
        .bind(user_id)
        .bind(role)
        .bind(now)
        .bind(now)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn update_role(
        pool: &SqlitePool,
        pet_id: &str,
        user_id: &str,
        role: Role,
    ) -> AppResult<Option<PetShare>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, PetShare>(
            r#"
            UPDATE pet_shares SET role = ?, updated_at = ?
            WHERE pet_id = ? AND user_id = ?
            RETURNING *
            "#,
        )
        .bind(role)
        .bind(now)
        .bind(pet_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, pet_id: &str, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM pet_shares WHERE pet_id = ? AND user_id = ?")
            .bind(pet_id)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Grantees of a pet along with their public profile.
    pub async fn list_for_pet(pool: &SqlitePool, pet_id: &str) -> AppResult<Vec<SharedUser>> {
        sqlx::query_as::<_, SharedUser>(
            r#"
            SELECT s.user_id, u.username, u.display_name, s.role, s.created_at
            FROM pet_shares s
            JOIN users u ON u.id = s.user_id
            WHERE s.pet_id = ?
            ORDER BY s.created_at ASC
            "#,
        )
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Grants held by `user_id`.
    pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<PetShare>> {
        sqlx::query_as::<_, PetShare>(
            "SELECT * FROM pet_shares WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
