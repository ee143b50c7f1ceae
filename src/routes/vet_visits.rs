use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::db::{CreateVetVisit, UpdateVetVisit, VetVisit, VetVisitRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::routes::{ApiResponse, RecordQuery};
use crate::services::authorization::{authorize_pet, ensure_can_act_on_pet, PetAction};
use crate::services::validation::{validate_create_vet_visit, validate_update_vet_visit};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_vet_visits).post(create_vet_visit))
        .route("/:id", put(update_vet_visit).delete(delete_vet_visit))
}

fn not_found() -> AppError {
    AppError::NotFound("Vet visit not found".to_string())
}

async fn list_vet_visits(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Query(query): Query<RecordQuery>,
) -> AppResult<Json<ApiResponse<Vec<VetVisit>>>> {
    let vet_visits = match query.pet_id {
        Some(pet_id) => {
            let pet = authorize_pet(&state, &actor, &pet_id, PetAction::View).await?;
            VetVisitRepository::list_for_pet(&state.db, &pet.id).await?
        }
        None => {
            VetVisitRepository::list_for_account(
                &state.db,
                actor.effective_account_id(),
                actor.id(),
            )
            .await?
        }
    };
    Ok(ApiResponse::ok("Vet visits retrieved", vet_visits))
}

async fn create_vet_visit(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(data): Json<CreateVetVisit>,
) -> AppResult<(StatusCode, Json<ApiResponse<VetVisit>>)> {
    validate_create_vet_visit(&data)?;
    authorize_pet(&state, &actor, &data.pet_id, PetAction::Mutate).await?;
    let vet_visit = VetVisitRepository::create(&state.db, data).await?;
    Ok(ApiResponse::created("Vet visit added", vet_visit))
}

async fn update_vet_visit(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    Json(data): Json<UpdateVetVisit>,
) -> AppResult<Json<ApiResponse<VetVisit>>> {
    validate_update_vet_visit(&data)?;
    let owner_id = VetVisitRepository::find_owner_account_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_can_act_on_pet(&actor, &owner_id)?;

    let vet_visit = VetVisitRepository::update(&state.db, &id, data)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok("Vet visit updated", vet_visit))
}

async fn delete_vet_visit(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let owner_id = VetVisitRepository::find_owner_account_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_can_act_on_pet(&actor, &owner_id)?;

    if !VetVisitRepository::delete(&state.db, &id).await? {
        return Err(not_found());
    }
    Ok(ApiResponse::message("Vet visit deleted"))
}
