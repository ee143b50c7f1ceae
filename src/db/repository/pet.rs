use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::VISIBLE_PETS_FILTER;
use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Pet Repository
// ============================================================================

pub struct PetRepository;

impl PetRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Pet>> {
        sqlx::query_as::<_, Pet>("SELECT * FROM pets WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_owner_id(pool: &SqlitePool, id: &str) -> AppResult<Option<String>> {
        sqlx::query_scalar("SELECT owner_id FROM pets WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Pets owned by `account_id` plus pets shared with `actor_id`.
    pub async fn list_visible(
        pool: &SqlitePool,
        account_id: &str,
        actor_id: &str,
    ) -> AppResult<Vec<VisiblePet>> {
        let sql = format!(
            r#"
            SELECT p.*, s.role AS shared_role
            FROM pets p
            LEFT JOIN pet_shares s ON s.pet_id = p.id AND s.user_id = ?
            WHERE {}
            ORDER BY p.created_at DESC
            "#,
            VISIBLE_PETS_FILTER
        );

        sqlx::query_as::<_, VisiblePet>(&sql)
            .bind(actor_id)
            .bind(account_id)
            .bind(actor_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn create(pool: &SqlitePool, owner_id: &str, data: CreatePet) -> AppResult<Pet> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Pet>(
            r#"
            INSERT INTO pets (
                id, owner_id, name, species, breed, gender, birth_date, color,
                microchip_id, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(owner_id)
        .bind(data.name.trim())
        .bind(data.species.trim())
        .bind(&data.breed)
        .bind(&data.gender)
        .bind(data.birth_date)
        .bind(&data.color)
        .bind(&data.microchip_id)
        .bind(&data.notes)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn update(pool: &SqlitePool, id: &str, data: UpdatePet) -> AppResult<Option<Pet>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Pet>(
            r#"
            UPDATE pets SET
                name = COALESCE(?, name),
                species = COALESCE(?, species),
                breed = COALESCE(?, breed),
                gender = COALESCE(?, gender),
                birth_date = COALESCE(?, birth_date),
                color = COALESCE(?, color),
                microchip_id = COALESCE(?, microchip_id),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(data.name.map(|n| n.trim().to_string()))
        .bind(data.species.map(|s| s.trim().to_string()))
        .bind(data.breed)
        .bind(data.gender)
        .bind(data.birth_date)
        .bind(data.color)
        .bind(data.microchip_id)
        .bind(data.notes)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Delete a pet; its records and share grants go with it.
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM pets WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
