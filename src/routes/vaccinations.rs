use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::db::{CreateVaccination, UpdateVaccination, Vaccination, VaccinationRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::routes::{ApiResponse, RecordQuery};
use crate::services::authorization::{authorize_pet, ensure_can_act_on_pet, PetAction};
use crate::services::validation::{validate_create_vaccination, validate_update_vaccination};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_vaccinations).post(create_vaccination))
        .route("/:id", put(update_vaccination).delete(delete_vaccination))
}

fn not_found() -> AppError {
    AppError::NotFound("Vaccination not found".to_string())
}

async fn list_vaccinations(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Query(query): Query<RecordQuery>,
) -> AppResult<Json<ApiResponse<Vec<Vaccination>>>> {
    let vaccinations = match query.pet_id {
        Some(pet_id) => {
            let pet = authorize_pet(&state, &actor, &pet_id, PetAction::View).await?;
            VaccinationRepository::list_for_pet(&state.db, &pet.id).await?
        }
        None => {
            VaccinationRepository::list_for_account(
                &state.db,
                actor.effective_account_id(),
                actor.id(),
            )
            .await?
        }
    };
    Ok(ApiResponse::ok("Vaccinations retrieved", vaccinations))
}

async fn create_vaccination(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(data): Json<CreateVaccination>,
) -> AppResult<(StatusCode, Json<ApiResponse<Vaccination>>)> {
    validate_create_vaccination(&data)?;
    authorize_pet(&state, &actor, &data.pet_id, PetAction::Mutate).await?;
    let vaccination = VaccinationRepository::create(&state.db, data).await?;
    Ok(ApiResponse::created("Vaccination added", vaccination))
}

async fn update_vaccination(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    Json(data): Json<UpdateVaccination>,
) -> AppResult<Json<ApiResponse<Vaccination>>> {
    let stored = VaccinationRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    let owner_id = VaccinationRepository::find_owner_account_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_can_act_on_pet(&actor, &owner_id)?;
    validate_update_vaccination(&data, &stored)?;

    let vaccination = VaccinationRepository::update(&state.db, &id, data)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok("Vaccination updated", vaccination))
}

async fn delete_vaccination(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let owner_id = VaccinationRepository::find_owner_account_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_can_act_on_pet(&actor, &owner_id)?;

    if !VaccinationRepository::delete(&state.db, &id).await? {
        return Err(not_found());
    }
    Ok(ApiResponse::message("Vaccination deleted"))
}
