pub mod auth;
pub mod calendar_events;
pub mod health;
pub mod medications;
pub mod pet_routes;
pub mod pets;
pub mod vaccinations;
pub mod vet_visits;
pub mod weights;

use std::sync::Arc;

use axum::{http::StatusCode, Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::Role;
use crate::error::{AppError, AppResult};
use crate::AppState;

/// Envelope shared by every successful response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(ApiResponse {
            success: true,
            message: message.into(),
            data: Some(data),
        })
    }

    pub fn created(message: impl Into<String>, data: T) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Self::ok(message, data))
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(ApiResponse {
            success: true,
            message: message.into(),
            data: None,
        })
    }
}

/// `?pet_id=` filter accepted by the record list endpoints.
#[derive(Debug, Deserialize)]
pub struct RecordQuery {
    pub pet_id: Option<String>,
}

/// Parse an optional role field, falling back to caretaker.
pub fn parse_role(role: Option<&str>) -> AppResult<Role> {
    match role {
        Some(r) => r.parse().map_err(AppError::BadRequest),
        None => Ok(Role::default()),
    }
}

/// Every authenticated resource router. `/api/auth` is mounted separately so
/// it can carry its own rate limiter.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api/pets", pets::router())
        .nest("/api/medications", medications::router())
        .nest("/api/vaccinations", vaccinations::router())
        .nest("/api/weights", weights::router())
        .nest("/api/vet-visits", vet_visits::router())
        .nest("/api/calendar-events", calendar_events::router())
        .nest("/api/routes", pet_routes::router())
}

#[cfg(test)]
pub mod test_support {
    //! Drive the full router in-process.

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::AppState;

    pub fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/health", get(super::health::health_check))
            .nest("/api/auth", super::auth::router())
            .merge(super::api_router())
            .with_state(state)
    }

    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Register an account and return `(token, user_id)`.
    pub async fn register(app: &Router, username: &str) -> (String, String) {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": format!("{}@example.com", username),
                "username": username,
                "password": "correct horse",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (
            body["data"]["token"].as_str().unwrap().to_string(),
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Register a sub-user of `parent` with `role`, log it in and return
    /// `(token, user_id)`.
    pub async fn register_sub_user(
        app: &Router,
        parent: &str,
        username: &str,
        role: &str,
    ) -> (String, String) {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/sub-users",
            Some(parent),
            Some(json!({
                "email": format!("{}@example.com", username),
                "username": username,
                "password": "correct horse",
                "role": role,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let user_id = body["data"]["user_id"].as_str().unwrap().to_string();

        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "login": username, "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        (body["data"]["token"].as_str().unwrap().to_string(), user_id)
    }

    /// Create a pet through the API and return its id.
    pub async fn create_pet(app: &Router, token: &str, name: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/pets",
            Some(token),
            Some(json!({ "name": name, "species": "dog" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}
