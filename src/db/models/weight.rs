use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WeightEntry {
    pub id: String,
    pub pet_id: String,
    pub weight_kg: f64,
    pub measured_at: NaiveDateTime,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWeightEntry {
    pub pet_id: String,
    pub weight_kg: f64,
    /// Defaults to the time of the request.
    pub measured_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWeightEntry {
    pub weight_kg: Option<f64>,
    pub measured_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
}
