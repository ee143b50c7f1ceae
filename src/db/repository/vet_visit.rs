use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::VISIBLE_PETS_FILTER;
use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Vet Visit Repository
// ============================================================================

pub struct VetVisitRepository;

impl VetVisitRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<VetVisit>> {
        sqlx::query_as::<_, VetVisit>("SELECT * FROM vet_visits WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_owner_account_id(pool: &SqlitePool, id: &str) -> AppResult<Option<String>> {
        sqlx::query_scalar(
            "SELECT p.owner_id FROM vet_visits v JOIN pets p ON p.id = v.pet_id WHERE v.id = ?",
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
    ) -> AppResult<Vec<VetVisit>> {
        let sql = format!(
            r#"
            SELECT v.* FROM vet_visits v
            JOIN pets p ON p.id = v.pet_id
            WHERE {}
            ORDER BY v.visit_date DESC
            "#,
            VISIBLE_PETS_FILTER
        );

        sqlx::query_as::<_, VetVisit>(&sql)
            .bind(account_id)
            .bind(actor_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_for_pet(pool: &SqlitePool, pet_id: &str) -> AppResult<Vec<VetVisit>> {
        sqlx::query_as::<_, VetVisit>(
            "SELECT * FROM vet_visits WHERE pet_id = ? ORDER BY visit_date DESC",
        )
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn create(pool: &SqlitePool, data: CreateVetVisit) -> AppResult<VetVisit> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, VetVisit>(
            r#"
            INSERT INTO vet_visits (
                id, pet_id, visit_date, clinic, veterinarian, reason, diagnosis,
                treatment, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&data.pet_id)
        .bind(data.visit_date)
        .bind(&data.clinic)
        .bind(&data.veterinarian)
        .bind(data.reason.trim())
        .bind(&data.diagnosis)
        .bind(&data.treatment)
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
        data: UpdateVetVisit,
    ) -> AppResult<Option<VetVisit>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, VetVisit>(
            r#"
            UPDATE vet_visits SET
                visit_date = COALESCE(?, visit_date),
                clinic = COALESCE(?, clinic),
                veterinarian = COALESCE(?, veterinarian),
                reason = COALESCE(?, reason),
                diagnosis = COALESCE(?, diagnosis),
                treatment = COALESCE(?, treatment),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(data.visit_date)
        .bind(data.clinic)
        .bind(data.veterinarian)
        .bind(data.reason.map(|r| r.trim().to_string()))
        .bind(data.diagnosis)
        .bind(data.treatment)
        .bind(data.notes)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM vet_visits WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
