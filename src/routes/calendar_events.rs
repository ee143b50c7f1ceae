//! Calendar entries. Anyone who can reach a pet (owner, owner-equivalent
//! sub-user, share grantee) may add and edit entries. Deletion needs rights to
//! act on the pet, or authorship of the entry plus current access to the pet.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::db::{
    CalendarEvent, CalendarEventRepository, CreateCalendarEvent, UpdateCalendarEvent,
};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::routes::{ApiResponse, RecordQuery};
use crate::services::authorization::{
    authorize_pet, ensure_can_act_on_pet, ensure_pet_permission, PetAction,
};
use crate::services::validation::{
    validate_create_calendar_event, validate_update_calendar_event,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/:id", put(update_event).delete(delete_event))
}

fn not_found() -> AppError {
    AppError::NotFound("Calendar event not found".to_string())
}

async fn list_events(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Query(query): Query<RecordQuery>,
) -> AppResult<Json<ApiResponse<Vec<CalendarEvent>>>> {
    let events = match query.pet_id {
        Some(pet_id) => {
            let pet = authorize_pet(&state, &actor, &pet_id, PetAction::View).await?;
            CalendarEventRepository::list_for_pet(&state.db, &pet.id).await?
        }
        None => {
            CalendarEventRepository::list_for_account(
                &state.db,
                actor.effective_account_id(),
                actor.id(),
            )
            .await?
        }
    };
    Ok(ApiResponse::ok("Calendar events retrieved", events))
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(data): Json<CreateCalendarEvent>,
) -> AppResult<(StatusCode, Json<ApiResponse<CalendarEvent>>)> {
    validate_create_calendar_event(&data)?;
    authorize_pet(&state, &actor, &data.pet_id, PetAction::Contribute).await?;
    let event = CalendarEventRepository::create(&state.db, actor.id(), data).await?;
    Ok(ApiResponse::created("Calendar event added", event))
}

async fn update_event(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    Json(data): Json<UpdateCalendarEvent>,
) -> AppResult<Json<ApiResponse<CalendarEvent>>> {
    let event = CalendarEventRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_pet_permission(&state, &actor, &event.pet_id, PetAction::Contribute).await?;
    validate_update_calendar_event(&data, &event)?;

    let event = CalendarEventRepository::update(&state.db, &id, data)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok("Calendar event updated", event))
}

async fn delete_event(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let event = CalendarEventRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;

    if event.user_id.as_deref() == Some(actor.id()) {
        ensure_pet_permission(&state, &actor, &event.pet_id, PetAction::Contribute).await?;
    } else {
        let owner_id = CalendarEventRepository::find_owner_account_id(&state.db, &id)
            .await?
            .ok_or_else(not_found)?;
        ensure_can_act_on_pet(&actor, &owner_id)?;
    }

    if !CalendarEventRepository::delete(&state.db, &id).await? {
        return Err(not_found());
    }
    Ok(ApiResponse::message("Calendar event deleted"))
}
