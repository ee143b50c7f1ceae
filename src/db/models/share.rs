use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Role;

// ============================================================================
// Pet Share Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PetShare {
    pub id: String,
    pub pet_id: String,
    pub user_id: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Share grant joined with the grantee's public profile.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SharedUser {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub created_at: NaiveDateTime,
}
