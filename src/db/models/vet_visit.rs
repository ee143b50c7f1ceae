use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VetVisit {
    pub id: String,
    pub pet_id: String,
    pub visit_date: NaiveDateTime,
    pub clinic: Option<String>,
    pub veterinarian: Option<String>,
    pub reason: String,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVetVisit {
    pub pet_id: String,
    pub visit_date: NaiveDateTime,
    pub clinic: Option<String>,
    pub veterinarian: Option<String>,
    pub reason: String,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateVetVisit {
    pub visit_date: Option<NaiveDateTime>,
    pub clinic: Option<String>,
    pub veterinarian: Option<String>,
    pub reason: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub notes: Option<String>,
}
