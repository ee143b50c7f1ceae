use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{
    CalendarEvent, CalendarEventRepository, Medication, MedicationRepository, Pet,
    PetShareRepository, Role, Route, RouteRepository, Vaccination, VaccinationRepository,
    VetVisit, VetVisitRepository, WeightEntry, WeightRepository,
};
use crate::error::AppResult;

/// A pet together with every record attached to it.
#[derive(Debug, Serialize)]
pub struct PetDetails {
    #[serde(flatten)]
    pub pet: Pet,
    /// Role of the viewer's share grant, when the pet is seen through one.
    pub shared_role: Option<Role>,
    pub medications: Vec<Medication>,
    pub vaccinations: Vec<Vaccination>,
    pub weights: Vec<WeightEntry>,
    pub vet_visits: Vec<VetVisit>,
    pub calendar_events: Vec<CalendarEvent>,
    pub routes: Vec<Route>,
}

pub struct PetService;

impl PetService {
    /// Aggregate a pet's records as seen by `viewer_id`. Callers authorize first.
    pub async fn details(pool: &SqlitePool, pet: Pet, viewer_id: &str) -> AppResult<PetDetails> {
        let (share, medications, vaccinations, weights, vet_visits, calendar_events, routes) =
            tokio::try_join!(
                PetShareRepository::find(pool, &pet.id, viewer_id),
                MedicationRepository::list_for_pet(pool, &pet.id),
                VaccinationRepository::list_for_pet(pool, &pet.id),
                WeightRepository::list_for_pet(pool, &pet.id),
                VetVisitRepository::list_for_pet(pool, &pet.id),
                CalendarEventRepository::list_for_pet(pool, &pet.id),
                RouteRepository::list_for_pet(pool, &pet.id),
            )?;

        Ok(PetDetails {
            pet,
            shared_role: share.map(|s| s.role),
            medications,
            vaccinations,
            weights,
            vet_visits,
            calendar_events,
            routes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::db::test_support::{create_pet, create_user, test_db};
    use crate::db::{CreateMedication, CreateWeightEntry};

    #[tokio::test]
    async fn details_collects_records_and_share_role() {
        let db = test_db().await;
        let owner = create_user(&db.pool, "owner").await;
        let friend = create_user(&db.pool, "friend").await;
        let pet = create_pet(&db.pool, &owner.id, "Rex").await;

        MedicationRepository::create(
            &db.pool,
            CreateMedication {
                pet_id: pet.id.clone(),
                name: "Carprofen".to_string(),
                dosage: Some("25mg".to_string()),
                frequency: None,
                start_date: Some(Utc::now().date_naive()),
                end_date: None,
                notes: None,
            },
        )
        .await
        .unwrap();
        WeightRepository::create(
            &db.pool,
            CreateWeightEntry {
                pet_id: pet.id.clone(),
                weight_kg: 12.5,
                measured_at: None,
                notes: None,
            },
        )
        .await
        .unwrap();
        PetShareRepository::create_if_absent(&db.pool, &pet.id, &friend.id, Role::Caretaker)
            .await
            .unwrap();

        let details = PetService::details(&db.pool, pet.clone(), &friend.id)
            .await
            .unwrap();
        assert_eq!(details.medications.len(), 1);
        assert_eq!(details.weights.len(), 1);
        assert!(details.routes.is_empty());
        assert_eq!(details.shared_role, Some(Role::Caretaker));

        let own = PetService::details(&db.pool, pet, &owner.id).await.unwrap();
        assert!(own.shared_role.is_none());
    }
}
