use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::VISIBLE_PETS_FILTER;
use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Route Repository
// ============================================================================

pub struct RouteRepository;

impl RouteRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Route>> {
        sqlx::query_as::<_, Route>("SELECT * FROM routes WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_owner_account_id(pool: &SqlitePool, id: &str) -> AppResult<Option<String>> {
        sqlx::query_scalar(
            "SELECT p.owner_id FROM routes r JOIN pets p ON p.id = r.pet_id WHERE r.id = ?",
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
    ) -> AppResult<Vec<Route>> {
        let sql = format!(
            r#"
            SELECT r.* FROM routes r
            JOIN pets p ON p.id = r.pet_id
            WHERE {}
            ORDER BY r.started_at DESC
            "#,
            VISIBLE_PETS_FILTER
        );

        sqlx::query_as::<_, Route>(&sql)
            .bind(account_id)
            .bind(actor_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_for_pet(pool: &SqlitePool, pet_id: &str) -> AppResult<Vec<Route>> {
        sqlx::query_as::<_, Route>("SELECT * FROM routes WHERE pet_id = ? ORDER BY started_at DESC")
            .bind(pet_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_coordinates(
        pool: &SqlitePool,
        route_id: &str,
    ) -> AppResult<Vec<RouteCoordinate>> {
        sqlx::query_as::<_, RouteCoordinate>(
            "SELECT * FROM route_coordinates WHERE route_id = ? ORDER BY seq ASC",
        )
        .bind(route_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Create a route together with its initial coordinate batch.
    ///
    /// Runs in one transaction: if any sample fails to insert, neither the
    /// route nor any of its samples are kept.
    pub async fn create_with_coordinates(
        pool: &SqlitePool,
        user_id: &str,
        data: CreateRoute,
    ) -> AppResult<(Route, Vec<RouteCoordinate>)> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let mut tx = pool.begin().await?;

        let route = sqlx::query_as::<_, Route>(
            r#"
            INSERT INTO routes (
                id, pet_id, user_id, name, started_at, ended_at, distance_m, notes,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&data.pet_id)
        .bind(user_id)
        .bind(&data.name)
        .bind(data.started_at)
        .bind(data.ended_at)
        .bind(data.distance_m)
        .bind(&data.notes)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let coordinates =
            Self::insert_coordinates(&mut tx, &route.id, user_id, &data.coordinates).await?;

        tx.commit().await?;
        Ok((route, coordinates))
    }

    /// Append samples after the current last one, all-or-nothing.
    ///
    /// The first statement of the transaction is a write, so concurrent
    /// appends queue on the database lock instead of failing on a stale read.
    pub async fn append_coordinates(
        pool: &SqlitePool,
        route_id: &str,
        user_id: &str,
        samples: &[CoordinateInput],
    ) -> AppResult<Vec<RouteCoordinate>> {
        let mut tx = pool.begin().await?;

        let inserted = Self::insert_coordinates(&mut tx, route_id, user_id, samples).await?;

        sqlx::query("UPDATE routes SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().naive_utc())
            .bind(route_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(inserted)
    }

    /// Insert samples in order. Each `seq` is derived inside its INSERT from
    /// the rows already committed or written by this transaction.
    async fn insert_coordinates(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        route_id: &str,
        user_id: &str,
        samples: &[CoordinateInput],
    ) -> AppResult<Vec<RouteCoordinate>> {
        let mut out = Vec::with_capacity(samples.len());

        for sample in samples {
            let coordinate = sqlx::query_as::<_, RouteCoordinate>(
                r#"
                INSERT INTO route_coordinates (
                    id, route_id, user_id, seq, latitude, longitude, recorded_at
                ) VALUES (
                    ?, ?, ?,
                    (SELECT COALESCE(MAX(seq) + 1, 0) FROM route_coordinates WHERE route_id = ?),
                    ?, ?, ?
                )
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(route_id)
            .bind(user_id)
            .bind(route_id)
            .bind(sample.latitude)
            .bind(sample.longitude)
            .bind(sample.recorded_at)
            .fetch_one(&mut **tx)
            .await
            .map_err(AppError::Database)?;

            out.push(coordinate);
        }

        Ok(out)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        data: UpdateRoute,
    ) -> AppResult<Option<Route>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Route>(
            r#"
            UPDATE routes SET
                name = COALESCE(?, name),
                started_at = COALESCE(?, started_at),
                ended_at = COALESCE(?, ended_at),
                distance_m = COALESCE(?, distance_m),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(data.name)
        .bind(data.started_at)
        .bind(data.ended_at)
        .bind(data.distance_m)
        .bind(data.notes)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Delete a route; its coordinate samples cascade.
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM routes WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
