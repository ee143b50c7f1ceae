use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::VISIBLE_PETS_FILTER;
use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Medication Repository
// ============================================================================

pub struct MedicationRepository;

impl MedicationRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Medication>> {
        sqlx::query_as::<_, Medication>("SELECT * FROM medications WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Owner of the pet the medication belongs to.
    pub async fn find_owner_account_id(pool: &SqlitePool, id: &str) -> AppResult<Option<String>> {
        sqlx::query_scalar(
            "SELECT p.owner_id FROM medications m JOIN pets p ON p.id = m.pet_id WHERE m.id = ?",
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
    ) -> AppResult<Vec<Medication>> {
        let sql = format!(
            r#"
            SELECT m.* FROM medications m
            JOIN pets p ON p.id = m.pet_id
            WHERE {}
            ORDER BY m.created_at DESC
            "#,
            VISIBLE_PETS_FILTER
        );

        sqlx::query_as::<_, Medication>(&sql)
            .bind(account_id)
            .bind(actor_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_for_pet(pool: &SqlitePool, pet_id: &str) -> AppResult<Vec<Medication>> {
        sqlx::query_as::<_, Medication>(
            "SELECT * FROM medications WHERE pet_id = ? ORDER BY created_at DESC",
        )
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn create(pool: &SqlitePool, data: CreateMedication) -> AppResult<Medication> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Medication>(
            r#"
            INSERT INTO medications (
                id, pet_id, name, dosage, frequency, start_date, end_date, notes,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&data.pet_id)
        .bind(data.name.trim())
        .bind(&data.dosage)
        .bind(&data.frequency)
        .bind(data.start_date)
        .bind(data.end_date)
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
        data: UpdateMedication,
    ) -> AppResult<Option<Medication>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Medication>(
            r#"
            UPDATE medications SET
                name = COALESCE(?, name),
                dosage = COALESCE(?, dosage),
                frequency = COALESCE(?, frequency),
                start_date = COALESCE(?, start_date),
                end_date = COALESCE(?, end_date),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(data.name.map(|n| n.trim().to_string()))
        .bind(data.dosage)
        .bind(data.frequency)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.notes)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM medications WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
