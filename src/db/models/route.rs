use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Route (walk tracking) Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub pet_id: String,
    /// Authenticated account that recorded the route, if it still exists.
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub distance_m: Option<f64>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RouteCoordinate {
    pub id: String,
    pub route_id: String,
    pub user_id: Option<String>,
    /// Position within the route, starting at 0.
    pub seq: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinateInput {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoute {
    pub pet_id: String,
    pub name: Option<String>,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub distance_m: Option<f64>,
    pub notes: Option<String>,
    #[serde(default)]
    pub coordinates: Vec<CoordinateInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRoute {
    pub name: Option<String>,
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
    pub distance_m: Option<f64>,
    pub notes: Option<String>,
}
