use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::VISIBLE_PETS_FILTER;
use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Vaccination Repository
// ============================================================================

pub struct VaccinationRepository;

impl VaccinationRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Vaccination>> {
        sqlx::query_as::<_, Vaccination>("SELECT * FROM vaccinations WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_owner_account_id(pool: &SqlitePool, id: &str) -> AppResult<Option<String>> {
        sqlx::query_scalar(
            "SELECT p.owner_id FROM vaccinations v JOIN pets p ON p.id = v.pet_id WHERE v.id = ?",
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
    ) -> AppResult<Vec<Vaccination>> {
        let sql = format!(
            r#"
            SELECT v.* FROM vaccinations v
            JOIN pets p ON p.id = v.pet_id
            WHERE {}
            ORDER BY v.administered_on DESC
            "#,
            VISIBLE_PETS_FILTER
        );

        sqlx::query_as::<_, Vaccination>(&sql)
            .bind(account_id)
            .bind(actor_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_for_pet(pool: &SqlitePool, pet_id: &str) -> AppResult<Vec<Vaccination>> {
        sqlx::query_as::<_, Vaccination>(
            "SELECT * FROM vaccinations WHERE pet_id = ? ORDER BY administered_on DESC",
        )
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn create(pool: &SqlitePool, data: CreateVaccination) -> AppResult<Vaccination> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Vaccination>(
            r#"
            INSERT INTO vaccinations (
                id, pet_id, name, administered_on, next_due_on, batch_number,
                veterinarian, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&data.pet_id)
        .bind(data.name.trim())
        .bind(data.administered_on)
        .bind(data.next_due_on)
        .bind(&data.batch_number)
        .bind(&data.veterinarian)
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
        data: UpdateVaccination,
    ) -> AppResult<Option<Vaccination>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Vaccination>(
            r#"
            UPDATE vaccinations SET
                name = COALESCE(?, name),
                administered_on = COALESCE(?, administered_on),
                next_due_on = COALESCE(?, next_due_on),
                batch_number = COALESCE(?, batch_number),
                veterinarian = COALESCE(?, veterinarian),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(data.name.map(|n| n.trim().to_string()))
        .bind(data.administered_on)
        .bind(data.next_due_on)
        .bind(data.batch_number)
        .bind(data.veterinarian)
        .bind(data.notes)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM vaccinations WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
