use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::VISIBLE_PETS_FILTER;
use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Weight Repository
// ============================================================================

pub struct WeightRepository;

impl WeightRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<WeightEntry>> {
        sqlx::query_as::<_, WeightEntry>("SELECT * FROM weights WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_owner_account_id(pool: &SqlitePool, id: &str) -> AppResult<Option<String>> {
        sqlx::query_scalar(
            "SELECT p.owner_id FROM weights w JOIN pets p ON p.id = w.pet_id WHERE w.id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_for_account(
        pool: &SqlitePool,
        account_id: &str,
        actor_id: &str,
    ) -> AppResult<Vec<WeightEntry>> {
        let sql = format!(
            r#"
            SELECT w.* FROM weights w
            JOIN pets p ON p.id = w.pet_id
            WHERE {}
            ORDER BY w.measured_at DESC
            "#,
            VISIBLE_PETS_FILTER
        );

        sqlx::query_as::<_, WeightEntry>(&sql)
            .bind(account_id)
            .bind(actor_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Weight history of a pet, oldest first so it can be charted directly.
    pub async fn list_for_pet(pool: &SqlitePool, pet_id: &str) -> AppResult<Vec<WeightEntry>> {
        sqlx::query_as::<_, WeightEntry>(
            "SELECT * FROM weights WHERE pet_id = ? ORDER BY measured_at ASC",
        )
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn create(pool: &SqlitePool, data: CreateWeightEntry) -> AppResult<WeightEntry> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, WeightEntry>(
            r#"
            INSERT INTO weights (id, pet_id, weight_kg, measured_at, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&data.pet_id)
        .bind(data.weight_kg)
        .bind(data.measured_at.unwrap_or(now))
        .bind(&data.notes)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        data: UpdateWeightEntry,
    ) -> AppResult<Option<WeightEntry>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, WeightEntry>(
            r#"
            UPDATE weights SET
                weight_kg = COALESCE(?, weight_kg),
                measured_at = COALESCE(?, measured_at),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(data.weight_kg)
        .bind(data.measured_at)
        .bind(data.notes)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM weights WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
