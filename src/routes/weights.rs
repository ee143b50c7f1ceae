use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::db::{CreateWeightEntry, UpdateWeightEntry, WeightEntry, WeightRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::routes::{ApiResponse, RecordQuery};
use crate::services::authorization::{authorize_pet, ensure_can_act_on_pet, PetAction};
use crate::services::validation::{validate_create_weight, validate_update_weight};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_weights).post(create_weight))
        .route("/:id", put(update_weight).delete(delete_weight))
}

fn not_found() -> AppError {
    AppError::NotFound("Weight entry not found".to_string())
}

async fn list_weights(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Query(query): Query<RecordQuery>,
) -> AppResult<Json<ApiResponse<Vec<WeightEntry>>>> {
    let weights = match query.pet_id {
        Some(pet_id) => {
            let pet = authorize_pet(&state, &actor, &pet_id, PetAction::View).await?;
            WeightRepository::list_for_pet(&state.db, &pet.id).await?
        }
        None => {
            WeightRepository::list_for_account(
                &state.db,
                actor.effective_account_id(),
                actor.id(),
            )
            .await?
        }
    };
    Ok(ApiResponse::ok("Weights retrieved", weights))
}

async fn create_weight(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(data): Json<CreateWeightEntry>,
) -> AppResult<(StatusCode, Json<ApiResponse<WeightEntry>>)> {
    validate_create_weight(&data)?;
    authorize_pet(&state, &actor, &data.pet_id, PetAction::Mutate).await?;
    let weight = WeightRepository::create(&state.db, data).await?;
    Ok(ApiResponse::created("Weight entry added", weight))
}

async fn update_weight(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    Json(data): Json<UpdateWeightEntry>,
) -> AppResult<Json<ApiResponse<WeightEntry>>> {
    validate_update_weight(&data)?;
    let owner_id = WeightRepository::find_owner_account_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_can_act_on_pet(&actor, &owner_id)?;

    let weight = WeightRepository::update(&state.db, &id, data)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok("Weight entry updated", weight))
}

async fn delete_weight(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let owner_id = WeightRepository::find_owner_account_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_can_act_on_pet(&actor, &owner_id)?;

    if !WeightRepository::delete(&state.db, &id).await? {
        return Err(not_found());
    }
    Ok(ApiResponse::message("Weight entry deleted"))
}
