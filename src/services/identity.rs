//! Turning a bearer token into the acting identity, and the identity into the
//! account whose data "list mine" reads should return.

use std::sync::Arc;

use crate::db::{Role, SubUserRepository, User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::services::auth::AuthService;
use crate::AppState;

/// The authenticated actor of a request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
    /// Parent account when the actor is a sub-user.
    pub parent_id: Option<String>,
    /// Role held under `parent_id`.
    pub role: Option<Role>,
}

impl Identity {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn is_sub_user(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }

    /// The actor's own account, or its parent when the actor is a sub-user.
    pub fn effective_account_id(&self) -> &str {
        self.parent_id.as_deref().unwrap_or(&self.user.id)
    }

    /// Whether the actor is an owner-equivalent sub-user of `account_id`.
    pub fn is_owner_equivalent_of(&self, account_id: &str) -> bool {
        self.parent_id.as_deref() == Some(account_id)
            && self.role.map_or(false, |r| r.is_owner_equivalent())
    }
}

/// Verify a session token and load the actor.
///
/// With `auth.revalidate_sub_user_link` on, the parent/role pair comes from the
/// live link table and token claims are ignored. Otherwise the claims captured
/// at login are used as-is until the token expires.
pub async fn resolve_identity(state: &Arc<AppState>, token: &str) -> AppResult<Identity> {
    let claims = AuthService::decode_jwt(&state.config, token)?;
    let user = UserRepository::find_by_id(&state.db, &claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let (parent_id, role) = if state.config.auth.revalidate_sub_user_link {
        match SubUserRepository::find_by_user_id(&state.db, &user.id).await? {
            Some(link) => (Some(link.parent_id), Some(link.role)),
            None => (None, None),
        }
    } else {
        match (claims.parent_id, claims.role) {
            (Some(parent_id), Some(role)) => (Some(parent_id), Some(role)),
            _ => (None, None),
        }
    };

    Ok(Identity {
        user,
        parent_id,
        role,
    })
}
