//! Recorded walks (`/api/routes`) and their GPS samples.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{
    CoordinateInput, CreateRoute, Route, RouteCoordinate, RouteRepository, UpdateRoute,
};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::routes::{ApiResponse, RecordQuery};
use crate::services::authorization::{
    authorize_pet, ensure_can_act_on_pet, ensure_pet_permission, PetAction,
};
use crate::services::validation::{
    validate_coordinates, validate_create_route, validate_update_route,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_routes).post(create_route))
        .route("/:id", put(update_route).delete(delete_route))
        .route(
            "/:id/coordinates",
            get(list_coordinates).post(add_coordinates),
        )
}

#[derive(Debug, Serialize)]
pub struct RouteWithCoordinates {
    #[serde(flatten)]
    pub route: Route,
    pub coordinates: Vec<RouteCoordinate>,
}

#[derive(Debug, Deserialize)]
pub struct AddCoordinatesRequest {
    pub coordinates: Vec<CoordinateInput>,
}

fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

async fn list_routes(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Query(query): Query<RecordQuery>,
) -> AppResult<Json<ApiResponse<Vec<Route>>>> {
    let routes = match query.pet_id {
        Some(pet_id) => {
            let pet = authorize_pet(&state, &actor, &pet_id, PetAction::View).await?;
            RouteRepository::list_for_pet(&state.db, &pet.id).await?
        }
        None => {
            RouteRepository::list_for_account(&state.db, actor.effective_account_id(), actor.id())
                .await?
        }
    };
    Ok(ApiResponse::ok("Routes retrieved", routes))
}

/// Create a route, optionally with its first batch of samples. Both are
/// stored together or not at all.
async fn create_route(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(data): Json<CreateRoute>,
) -> AppResult<(StatusCode, Json<ApiResponse<RouteWithCoordinates>>)> {
    validate_create_route(&data)?;
    authorize_pet(&state, &actor, &data.pet_id, PetAction::Mutate).await?;

    let (route, coordinates) =
        RouteRepository::create_with_coordinates(&state.db, actor.id(), data).await?;
    tracing::info!(
        "Account {} recorded route {} with {} samples",
        actor.id(),
        route.id,
        coordinates.len()
    );
    Ok(ApiResponse::created(
        "Route created",
        RouteWithCoordinates { route, coordinates },
    ))
}

async fn update_route(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    Json(data): Json<UpdateRoute>,
) -> AppResult<Json<ApiResponse<Route>>> {
    let stored = RouteRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    let owner_id = RouteRepository::find_owner_account_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_can_act_on_pet(&actor, &owner_id)?;
    validate_update_route(&data, &stored)?;

    let route = RouteRepository::update(&state.db, &id, data)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok("Route updated", route))
}

async fn delete_route(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let owner_id = RouteRepository::find_owner_account_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_can_act_on_pet(&actor, &owner_id)?;

    if !RouteRepository::delete(&state.db, &id).await? {
        return Err(not_found());
    }
    Ok(ApiResponse::message("Route deleted"))
}

async fn list_coordinates(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<RouteCoordinate>>>> {
    let route = RouteRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_pet_permission(&state, &actor, &route.pet_id, PetAction::View).await?;

    let coordinates = RouteRepository::list_coordinates(&state.db, &route.id).await?;
    Ok(ApiResponse::ok("Coordinates retrieved", coordinates))
}

/// Append samples to a route. Requires mutation rights on the pet at the time
/// of the call, whoever recorded the route. Samples belong to the caller.
async fn add_coordinates(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<AddCoordinatesRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Vec<RouteCoordinate>>>)> {
    validate_coordinates(&request.coordinates)?;
    let owner_id = RouteRepository::find_owner_account_id(&state.db, &id)
        .await?
        .ok_or_else(not_found)?;
    ensure_can_act_on_pet(&actor, &owner_id)?;

    let coordinates =
        RouteRepository::append_coordinates(&state.db, &id, actor.id(), &request.coordinates)
            .await?;
    Ok(ApiResponse::created("Coordinates added", coordinates))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    use crate::db::test_support::test_state;
    use crate::routes::test_support::{app, create_pet, register, register_sub_user, send};

    fn samples(count: usize, start_lat: f64) -> Value {
        let items: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "latitude": start_lat + i as f64 * 0.001,
                    "longitude": 13.4,
                    "recorded_at": format!("2025-04-01T09:{:02}:00", i),
                })
            })
            .collect();
        Value::Array(items)
    }

    #[tokio::test]
    async fn route_with_samples_then_append() {
        let (state, _db) = test_state().await;
        let app = app(state);
        let (owner, owner_id) = register(&app, "owner").await;
        let pet_id = create_pet(&app, &owner, "Rex").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/routes",
            Some(&owner),
            Some(json!({
                "pet_id": pet_id,
                "name": "Park loop",
                "started_at": "2025-04-01T09:00:00",
                "coordinates": samples(3, 52.5),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["data"]["coordinates"].as_array().unwrap().len(), 3);
        let route_id = body["data"]["id"].as_str().unwrap().to_string();
        let coords_uri = format!("/api/routes/{}/coordinates", route_id);

        let (status, body) = send(
            &app,
            Method::POST,
            &coords_uri,
            Some(&owner),
            Some(json!({ "coordinates": samples(2, 52.6) })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"][0]["seq"], 3);
        assert_eq!(body["data"][1]["user_id"], owner_id.as_str());

        let (status, body) = send(&app, Method::GET, &coords_uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        let seqs: Vec<i64> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn out_of_range_samples_are_rejected() {
        let (state, _db) = test_state().await;
        let app = app(state);
        let (owner, _) = register(&app, "owner").await;
        let pet_id = create_pet(&app, &owner, "Rex").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/routes",
            Some(&owner),
            Some(json!({
                "pet_id": pet_id,
                "started_at": "2025-04-01T09:00:00",
                "coordinates": samples(2, 89.9995),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);

        let (_, body) = send(
            &app,
            Method::GET,
            &format!("/api/routes?pet_id={}", pet_id),
            Some(&owner),
            None,
        )
        .await;
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stranger_cannot_extend_route() {
        let (state, _db) = test_state().await;
        let app = app(state);
        let (owner, _) = register(&app, "owner").await;
        let (stranger, _) = register(&app, "stranger").await;
        let pet_id = create_pet(&app, &owner, "Rex").await;

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/routes",
            Some(&owner),
            Some(json!({ "pet_id": pet_id, "started_at": "2025-04-01T09:00:00" })),
        )
        .await;
        let route_id = body["data"]["id"].as_str().unwrap().to_string();
        let coords_uri = format!("/api/routes/{}/coordinates", route_id);

        let (status, _) = send(
            &app,
            Method::POST,
            &coords_uri,
            Some(&stranger),
            Some(json!({ "coordinates": samples(1, 52.5) })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, Method::GET, &coords_uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::POST,
            &coords_uri,
            Some(&owner),
            Some(json!({ "coordinates": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unlinked_recorder_can_no_longer_extend_route() {
        let (state, _db) = test_state().await;
        let app = app(state);
        let (owner, _) = register(&app, "owner").await;
        let pet_id = create_pet(&app, &owner, "Rex").await;
        let (deputy, deputy_id) = register_sub_user(&app, &owner, "deputy", "owner").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/routes",
            Some(&deputy),
            Some(json!({ "pet_id": pet_id, "started_at": "2025-04-01T09:00:00" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let route_id = body["data"]["id"].as_str().unwrap().to_string();
        let coords_uri = format!("/api/routes/{}/coordinates", route_id);

        let (status, _) = send(
            &app,
            Method::POST,
            &coords_uri,
            Some(&deputy),
            Some(json!({ "coordinates": samples(1, 52.5) })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/auth/sub-users/{}", deputy_id),
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            Method::POST,
            &coords_uri,
            Some(&deputy),
            Some(json!({ "coordinates": samples(1, 52.6) })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = send(&app, Method::GET, &coords_uri, Some(&owner), None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }
}
