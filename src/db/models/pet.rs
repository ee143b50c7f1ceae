use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Role;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Pet {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub color: Option<String>,
    pub microchip_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Pet row as seen by a particular actor: `shared_role` is set when the actor
/// reaches the pet through a share grant rather than through its account.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VisiblePet {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub pet: Pet,
    pub shared_role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePet {
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub color: Option<String>,
    pub microchip_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePet {
    pub name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub color: Option<String>,
    pub microchip_id: Option<String>,
    pub notes: Option<String>,
}
