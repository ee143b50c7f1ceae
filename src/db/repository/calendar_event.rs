use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::VISIBLE_PETS_FILTER;
use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Calendar Event Repository
// ============================================================================

pub struct CalendarEventRepository;

impl CalendarEventRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<CalendarEvent>> {
        sqlx::query_as::<_, CalendarEvent>("SELECT * FROM calendar_events WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_owner_account_id(pool: &SqlitePool, id: &str) -> AppResult<Option<String>> {
        sqlx::query_scalar(
            r#"
            SELECT p.owner_id FROM calendar_events e
            JOIN pets p ON p.id = e.pet_id
            WHERE e.id = ?
            "#,
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
    ) -> AppResult<Vec<CalendarEvent>> {
        let sql = format!(
            r#"
            SELECT e.* FROM calendar_events e
            JOIN pets p ON p.id = e.pet_id
            WHERE {}
            ORDER BY e.starts_at ASC
            "#,
            VISIBLE_PETS_FILTER
        );

        sqlx::query_as::<_, CalendarEvent>(&sql)
            .bind(account_id)
            .bind(actor_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_for_pet(pool: &SqlitePool, pet_id: &str) -> AppResult<Vec<CalendarEvent>> {
        sqlx::query_as::<_, CalendarEvent>(
            "SELECT * FROM calendar_events WHERE pet_id = ? ORDER BY starts_at ASC",
        )
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: &str,
        data: CreateCalendarEvent,
    ) -> AppResult<CalendarEvent> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, CalendarEvent>(
            r#"
            INSERT INTO calendar_events (
                id, pet_id, user_id, title, description, event_type, starts_at, ends_at,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&data.pet_id)
        .bind(user_id)
        .bind(data.title.trim())
        .bind(&data.description)
        .bind(&data.event_type)
        .bind(data.starts_at)
        .bind(data.ends_at)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        data: UpdateCalendarEvent,
    ) -> AppResult<Option<CalendarEvent>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, CalendarEvent>(
            r#"
            UPDATE calendar_events SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                event_type = COALESCE(?, event_type),
                starts_at = COALESCE(?, starts_at),
                ends_at = COALESCE(?, ends_at),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(data.title.map(|t| t.trim().to_string()))
        .bind(data.description)
        .bind(data.event_type)
        .bind(data.starts_at)
        .bind(data.ends_at)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM calendar_events WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
