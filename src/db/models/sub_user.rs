use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Role;

// ============================================================================
// Sub-user Link Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubUserLink {
    pub id: String,
    pub parent_id: String,
    pub user_id: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A link joined with the public profile of the account on the other side.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LinkedAccount {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub linked_at: NaiveDateTime,
}

/// A pending request from `parent_id` to link `user_id` as a sub-user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubUserInvitation {
    pub id: String,
    pub parent_id: String,
    pub user_id: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// An invitation joined with the profile of the account on the other side:
/// the invitee for the parent's listing, the parent for the invitee's.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InvitationView {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub invited_at: NaiveDateTime,
}
