use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::db::{
    CreatePet, Pet, PetRepository, PetShare, PetShareRepository, SharedUser, UpdatePet,
    UserRepository, VisiblePet,
};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::routes::{parse_role, ApiResponse};
use crate::services::authorization::{authorize_pet, PetAction};
use crate::services::pets::{PetDetails, PetService};
use crate::services::share_code::{IssuedShareCode, ShareCodeService};
use crate::services::validation::{validate_create_pet, validate_update_pet};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_pets).post(create_pet))
        .route("/shared-with-me", get(shared_with_me))
        .route("/share/redeem", post(redeem_share_code))
        .route("/:id", get(get_pet).put(update_pet).delete(delete_pet))
        .route("/:id/share-code", post(issue_share_code))
        .route("/:id/shared-users", get(list_shared_users).post(share_pet))
        .route(
            "/:id/shared-users/:user_id",
            put(update_shared_user).delete(remove_shared_user),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct ShareCodeRequest {
    pub ttl_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SharePetRequest {
    /// Email or username of the grantee.
    pub login: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShareRoleRequest {
    pub role: String,
}

// ============================================================================
// Pet Handlers
// ============================================================================

async fn list_pets(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> AppResult<Json<ApiResponse<Vec<VisiblePet>>>> {
    let pets =
        PetRepository::list_visible(&state.db, actor.effective_account_id(), actor.id()).await?;
    Ok(ApiResponse::ok("Pets retrieved", pets))
}

async fn create_pet(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(data): Json<CreatePet>,
) -> AppResult<(StatusCode, Json<ApiResponse<Pet>>)> {
    validate_create_pet(&data)?;
    let pet = PetRepository::create(&state.db, actor.id(), data).await?;
    tracing::info!("Account {} created pet {}", actor.id(), pet.id);
    Ok(ApiResponse::created("Pet created", pet))
}

async fn get_pet(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<PetDetails>>> {
    let pet = authorize_pet(&state, &actor, &id, PetAction::View).await?;
    let details = PetService::details(&state.db, pet, actor.id()).await?;
    Ok(ApiResponse::ok("Pet retrieved", details))
}

async fn update_pet(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    Json(data): Json<UpdatePet>,
) -> AppResult<Json<ApiResponse<Pet>>> {
    validate_update_pet(&data)?;
    let pet = authorize_pet(&state, &actor, &id, PetAction::Manage).await?;
    let updated = PetRepository::update(&state.db, &pet.id, data)
        .await?
        .ok_or_else(|| AppError::NotFound("Pet not found".to_string()))?;
    Ok(ApiResponse::ok("Pet updated", updated))
}

async fn delete_pet(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let pet = authorize_pet(&state, &actor, &id, PetAction::Manage).await?;
    if !PetRepository::delete(&state.db, &pet.id).await? {
        return Err(AppError::NotFound("Pet not found".to_string()));
    }
    tracing::info!("Account {} deleted pet {}", actor.id(), pet.id);
    Ok(ApiResponse::message("Pet deleted"))
}

// ============================================================================
// Sharing Handlers
// ============================================================================

async fn issue_share_code(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    request: Option<Json<ShareCodeRequest>>,
) -> AppResult<(StatusCode, Json<ApiResponse<IssuedShareCode>>)> {
    let Json(request) = request.unwrap_or_default();
    let issued = ShareCodeService::issue(&state, &actor, &id, request.ttl_hours).await?;
    Ok(ApiResponse::created("Share code created", issued))
}

async fn redeem_share_code(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(request): Json<RedeemRequest>,
) -> AppResult<Json<ApiResponse<PetDetails>>> {
    let details = ShareCodeService::redeem(&state, &actor, &request.code).await?;
    Ok(ApiResponse::ok("Pet shared with you", details))
}

async fn list_shared_users(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<SharedUser>>>> {
    let pet = authorize_pet(&state, &actor, &id, PetAction::Manage).await?;
    let users = PetShareRepository::list_for_pet(&state.db, &pet.id).await?;
    Ok(ApiResponse::ok("Shared users retrieved", users))
}

/// Grant another account access to a pet directly, without a share code.
async fn share_pet(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<SharePetRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<PetShare>>)> {
    let role = parse_role(request.role.as_deref())?;
    let pet = authorize_pet(&state, &actor, &id, PetAction::Manage).await?;

    let grantee = UserRepository::find_by_login(&state.db, &request.login)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;
    if grantee.id == pet.owner_id {
        return Err(AppError::BadRequest(
            "A pet cannot be shared with its owner".to_string(),
        ));
    }

    let share = PetShareRepository::create_if_absent(&state.db, &pet.id, &grantee.id, role)
        .await?
        .ok_or_else(|| AppError::Conflict("Account already has access to this pet".to_string()))?;
    tracing::info!("Pet {} shared with account {} as {}", pet.id, grantee.id, role);
    Ok(ApiResponse::created("Pet shared", share))
}

async fn update_shared_user(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path((id, user_id)): Path<(String, String)>,
    Json(request): Json<ShareRoleRequest>,
) -> AppResult<Json<ApiResponse<PetShare>>> {
    let role = parse_role(Some(&request.role))?;
    let pet = authorize_pet(&state, &actor, &id, PetAction::Manage).await?;
    let share = PetShareRepository::update_role(&state.db, &pet.id, &user_id, role)
        .await?
        .ok_or_else(|| AppError::NotFound("Shared user not found".to_string()))?;
    Ok(ApiResponse::ok("Shared user updated", share))
}

async fn remove_shared_user(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path((id, user_id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<()>>> {
    let pet = authorize_pet(&state, &actor, &id, PetAction::Manage).await?;
    if !PetShareRepository::delete(&state.db, &pet.id, &user_id).await? {
        return Err(AppError::NotFound("Shared user not found".to_string()));
    }
    tracing::info!("Pet {} no longer shared with account {}", pet.id, user_id);
    Ok(ApiResponse::message("Shared user removed"))
}

async fn shared_with_me(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> AppResult<Json<ApiResponse<Vec<PetShare>>>> {
    let shares = PetShareRepository::list_for_user(&state.db, actor.id()).await?;
    Ok(ApiResponse::ok("Shared pets retrieved", shares))
}
