use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::db::{CreateMedication, Medication, MedicationRepository, UpdateMedication};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::routes::{ApiResponse, RecordQuery};
use crate::services::authorization::{authorize_pet, ensure_can_act_on_pet, PetAction};
use crate::services::validation::{validate_create_medication, validate_update_medication};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_medications).post(create_medication))
        .route("/:id", put(update_medication).delete(delete_medication))
}

fn not_found() -> AppError {
    AppError::NotFound("Medication not found".to_string())
}

async fn list_medications(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Query(query): Query<RecordQuery>,
) -> AppResult<Json<ApiResponse<Vec<Medication>>>> {
    let medications = match query.pet_id {
        Some(pet_id) => {
            let pet = authorize_pet(&state, &actor, &pet_id, PetAction::View).await?;
            MedicationRepository::list_for_pet(&state.db, &pet.id).await?
        }
        None => {
            MedicationRepository::list_for_account(
                &state.db,
                actor.effective_account_id(),
                actor.id(),
            )
            .await?
        }
    };
    Ok(ApiResponse::ok("Medications retrieved", medications))
}

async fn create_medication(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(data): Json<CreateMedication>,
) -> AppResult<(StatusCode, Json<ApiResponse<Medication>>)> {
    validate_create_medication(&data)?;
    authorize_pet(&state, &actor, &data.pet_id, PetAction::Mutate).await?;
    let medication = MedicationRepository::create(&state.db, data).await?;
    Ok(ApiResponse::created("Medication added", medication))
}

async fn update_medication(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    Json(data): Json<UpdateMedication>,
) -> AppResult<Json<ApiResponse<Medication>>> {
    let stored = MedicationRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    let owner_id = MedicationRepository::find_owner_account_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_can_act_on_pet(&actor, &owner_id)?;
    validate_update_medication(&data, &stored)?;

    let medication = MedicationRepository::update(&state.db, &id, data)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok("Medication updated", medication))
}

async fn delete_medication(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let owner_id = MedicationRepository::find_owner_account_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_can_act_on_pet(&actor, &owner_id)?;

    if !MedicationRepository::delete(&state.db, &id).await? {
        return Err(not_found());
    }
    Ok(ApiResponse::message("Medication deleted"))
}
