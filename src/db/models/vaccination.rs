use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Vaccination {
    pub id: String,
    pub pet_id: String,
    pub name: String,
    pub administered_on: NaiveDate,
    pub next_due_on: Option<NaiveDate>,
    pub batch_number: Option<String>,
    pub veterinarian: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVaccination {
    pub pet_id: String,
    pub name: String,
    pub administered_on: NaiveDate,
    pub next_due_on: Option<NaiveDate>,
    pub batch_number: Option<String>,
    pub veterinarian: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateVaccination {
    pub name: Option<String>,
    pub administered_on: Option<NaiveDate>,
    pub next_due_on: Option<NaiveDate>,
    pub batch_number: Option<String>,
    pub veterinarian: Option<String>,
    pub notes: Option<String>,
}
