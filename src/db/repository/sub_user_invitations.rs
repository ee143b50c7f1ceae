use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Sub-user Invitation Repository
// ============================================================================

pub struct SubUserInvitationRepository;

impl SubUserInvitationRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<SubUserInvitation>> {
        sqlx::query_as::<_, SubUserInvitation>("SELECT * FROM sub_user_invitations WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn create(
        pool: &SqlitePool,
        parent_id: &str,
        user_id: &str,
        role: Role,
    ) -> AppResult<SubUserInvitation> {
        if parent_id == user_id {
            return Err(AppError::BadRequest(
                "An account cannot be its own sub-user".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, SubUserInvitation>(
            r#"
            INSERT INTO sub_user_invitations (id, parent_id, user_id, role, created_at, updated_at)
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
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Account has already been invited".to_string())
            } else {
                AppError::Database(e)
            }
        })
    }

    /// Invitations sent by `parent_id`, joined with the invitee's profile.
    pub async fn list_sent(pool: &SqlitePool, parent_id: &str) -> AppResult<Vec<InvitationView>> {
        sqlx::query_as::<_, InvitationView>(
            r#"
            SELECT
                i.id, u.id AS user_id, u.email, u.username, u.display_name,
                i.role, i.created_at AS invited_at
            FROM sub_user_invitations i
            JOIN users u ON u.id = i.user_id
            WHERE i.parent_id = ?
            ORDER BY i.created_at ASC
            "#,
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Invitations addressed to `user_id`, joined with the inviting parent.
    pub async fn list_received(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Vec<InvitationView>> {
        sqlx::query_as::<_, InvitationView>(
            r#"
            SELECT
                i.id, u.id AS user_id, u.email, u.username, u.display_name,
                i.role, i.created_at AS invited_at
            FROM sub_user_invitations i
            JOIN users u ON u.id = i.parent_id
            WHERE i.user_id = ?
            ORDER BY i.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM sub_user_invitations WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Drop every invitation addressed to `user_id`, inside the transaction
    /// that links it.
    pub async fn delete_received_in(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        user_id: &str,
    ) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sub_user_invitations WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut **tx)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}
