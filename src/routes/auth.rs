use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{InvitationView, LinkedAccount, Role, User};
use crate::error::{AppError, AppResult};
use crate::routes::{parse_role, ApiResponse};
use crate::services::auth::{AccountChanges, AuthService, NewAccount};
use crate::services::identity::{resolve_identity, Identity};
use crate::services::sub_users::SubUserService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me).put(update_me).delete(delete_me))
        .route("/sub-users", get(list_sub_users).post(register_sub_user))
        .route("/sub-users/link", post(invite_sub_user))
        .route("/sub-users/invitations", get(list_sent_invitations))
        .route(
            "/sub-users/:id",
            put(update_sub_user_role).delete(remove_sub_user),
        )
        .route("/parent", get(get_parent).delete(leave_parent))
        .route("/invitations", get(list_received_invitations))
        .route("/invitations/:id", delete(dismiss_invitation))
        .route("/invitations/:id/accept", post(accept_invitation))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email or username.
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub token: String,
    pub parent_id: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub parent: Option<LinkedAccount>,
    pub effective_account_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterSubUserRequest {
    #[serde(flatten)]
    pub account: NewAccount,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkSubUserRequest {
    pub login: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

// ============================================================================
// Account Handlers
// ============================================================================

async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewAccount>,
) -> AppResult<(StatusCode, Json<ApiResponse<SessionResponse>>)> {
    let (user, token) = AuthService::register(&state, request).await?;
    Ok(ApiResponse::created(
        "Account created",
        SessionResponse {
            user,
            token,
            parent_id: None,
            role: None,
        },
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<SessionResponse>>> {
    let (user, link, token) = AuthService::login(&state, &request.login, request.password).await?;
    Ok(ApiResponse::ok(
        "Logged in",
        SessionResponse {
            user,
            token,
            parent_id: link.as_ref().map(|l| l.parent_id.clone()),
            role: link.map(|l| l.role),
        },
    ))
}

/// Tokens are stateless; the client discards its copy.
async fn logout(AuthUser(identity): AuthUser) -> Json<ApiResponse<()>> {
    tracing::debug!("Account {} logged out", identity.id());
    ApiResponse::message("Logged out")
}

async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<ApiResponse<MeResponse>>> {
    let parent = SubUserService::parent_of(&state, identity.id()).await?;
    let effective_account_id = identity.effective_account_id().to_string();
    Ok(ApiResponse::ok(
        "Profile retrieved",
        MeResponse {
            user: identity.user,
            parent,
            effective_account_id,
        },
    ))
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(changes): Json<AccountChanges>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = AuthService::update_account(&state, &identity, changes).await?;
    Ok(ApiResponse::ok("Profile updated", user))
}

async fn delete_me(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(request): Json<DeleteAccountRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    AuthService::delete_account(&state, &identity, request.password).await?;
    Ok(ApiResponse::message("Account deleted"))
}

// ============================================================================
// Sub-user Handlers
// ============================================================================

async fn register_sub_user(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(request): Json<RegisterSubUserRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<LinkedAccount>>)> {
    let role = parse_role(request.role.as_deref())?;
    let linked = SubUserService::register(&state, &identity, request.account, role).await?;
    Ok(ApiResponse::created("Sub-user registered", linked))
}

async fn invite_sub_user(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(request): Json<LinkSubUserRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<InvitationView>>)> {
    let role = parse_role(request.role.as_deref())?;
    let invitation = SubUserService::invite(&state, &identity, &request.login, role).await?;
    Ok(ApiResponse::created("Invitation sent", invitation))
}

async fn list_sent_invitations(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<ApiResponse<Vec<InvitationView>>>> {
    let invitations = SubUserService::sent_invitations(&state, &identity).await?;
    Ok(ApiResponse::ok("Invitations retrieved", invitations))
}

async fn list_sub_users(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<ApiResponse<Vec<LinkedAccount>>>> {
    let children = SubUserService::list(&state, &identity).await?;
    Ok(ApiResponse::ok("Sub-users retrieved", children))
}

async fn update_sub_user_role(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(user_id): Path<String>,
    Json(request): Json<RoleRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    let role = parse_role(Some(&request.role))?;
    SubUserService::change_role(&state, &identity, &user_id, role).await?;
    Ok(ApiResponse::message("Sub-user role updated"))
}

async fn remove_sub_user(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    SubUserService::remove(&state, &identity, &user_id).await?;
    Ok(ApiResponse::message("Sub-user removed"))
}

async fn get_parent(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<ApiResponse<Option<LinkedAccount>>>> {
    let parent = SubUserService::parent_of(&state, identity.id()).await?;
    Ok(ApiResponse::ok("Parent account retrieved", parent))
}

async fn leave_parent(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<ApiResponse<()>>> {
    SubUserService::leave(&state, &identity).await?;
    Ok(ApiResponse::message("Left parent account"))
}

// ============================================================================
// Invitation Handlers
// ============================================================================

async fn list_received_invitations(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<ApiResponse<Vec<InvitationView>>>> {
    let invitations = SubUserService::received_invitations(&state, &identity).await?;
    Ok(ApiResponse::ok("Invitations retrieved", invitations))
}

async fn accept_invitation(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<LinkedAccount>>> {
    let parent = SubUserService::accept(&state, &identity, &id).await?;
    Ok(ApiResponse::ok("Invitation accepted", parent))
}

async fn dismiss_invitation(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    SubUserService::dismiss(&state, &identity, &id).await?;
    Ok(ApiResponse::message("Invitation dismissed"))
}

// ============================================================================
// Auth Extractor
// ============================================================================

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Extractor for the authenticated actor.
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
            tracing::debug!("Authorization header doesn't start with 'Bearer '");
            return Err(AppError::Unauthorized);
        }

        let token = auth_header[7..].trim();
        if token.is_empty() {
            tracing::debug!("Empty bearer token in Authorization header");
            return Err(AppError::Unauthorized);
        }

        let identity = resolve_identity(state, token).await.map_err(|e| {
            tracing::debug!("Failed to resolve identity from token: {:?}", e);
            e
        })?;

        tracing::debug!("Authenticated account: {}", identity.id());
        Ok(AuthUser(identity))
    }
}
