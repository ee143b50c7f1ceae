//! Request body checks. Each `validate_*` function collects every problem it
//! finds and reports them together as `AppError::Validation`.

use chrono::{NaiveDate, NaiveDateTime};

use crate::db::models::*;
use crate::error::{AppError, AppResult};

const MAX_TEXT_LEN: usize = 255;
const MAX_NOTES_LEN: usize = 4096;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Default)]
pub struct Validator {
    errors: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.push(message.into());
        }
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), format!("{} is required", field))
            .max_len(field, value, MAX_TEXT_LEN)
    }

    /// An optional replacement value must not be blank.
    pub fn not_blank(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => self.required(field, v),
            None => self,
        }
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        self.check(
            value.chars().count() <= max,
            format!("{} cannot exceed {} characters", field, max),
        )
    }

    pub fn notes(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => self.max_len("notes", v, MAX_NOTES_LEN),
            None => self,
        }
    }

    pub fn date_order(
        &mut self,
        start_field: &str,
        start: Option<NaiveDate>,
        end_field: &str,
        end: Option<NaiveDate>,
    ) -> &mut Self {
        if let (Some(s), Some(e)) = (start, end) {
            self.check(e >= s, format!("{} cannot be before {}", end_field, start_field));
        }
        self
    }

    pub fn time_order(
        &mut self,
        start_field: &str,
        start: Option<NaiveDateTime>,
        end_field: &str,
        end: Option<NaiveDateTime>,
    ) -> &mut Self {
        if let (Some(s), Some(e)) = (start, end) {
            self.check(e >= s, format!("{} cannot be before {}", end_field, start_field));
        }
        self
    }

    pub fn finish(&mut self) -> AppResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    let email = email.trim();
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    v.check(well_formed, "email is not a valid address")
        .max_len("email", email, MAX_TEXT_LEN);
}

pub fn validate_username(v: &mut Validator, username: &str) {
    let username = username.trim();
    v.check(
        (3..=32).contains(&username.chars().count()),
        "username must be between 3 and 32 characters",
    )
    .check(
        username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.'),
        "username may only contain letters, digits, '_' and '.'",
    );
}

pub fn validate_password(v: &mut Validator, password: &str) {
    v.check(
        password.chars().count() >= MIN_PASSWORD_LEN,
        format!("password must be at least {} characters", MIN_PASSWORD_LEN),
    )
    .check(password.len() <= 72, "password cannot exceed 72 bytes");
}

pub fn validate_create_pet(data: &CreatePet) -> AppResult<()> {
    Validator::new()
        .required("name", &data.name)
        .required("species", &data.species)
        .notes(data.notes.as_deref())
        .finish()
}

pub fn validate_update_pet(data: &UpdatePet) -> AppResult<()> {
    Validator::new()
        .not_blank("name", data.name.as_deref())
        .not_blank("species", data.species.as_deref())
        .notes(data.notes.as_deref())
        .finish()
}

pub fn validate_create_medication(data: &CreateMedication) -> AppResult<()> {
    Validator::new()
        .required("pet_id", &data.pet_id)
        .required("name", &data.name)
        .date_order("start_date", data.start_date, "end_date", data.end_date)
        .notes(data.notes.as_deref())
        .finish()
}

/// Update checks run against `stored` merged with the changes, so a partial
/// update cannot break an ordering with a field it leaves untouched.
pub fn validate_update_medication(data: &UpdateMedication, stored: &Medication) -> AppResult<()> {
    Validator::new()
        .not_blank("name", data.name.as_deref())
        .date_order(
            "start_date",
            data.start_date.or(stored.start_date),
            "end_date",
            data.end_date.or(stored.end_date),
        )
        .notes(data.notes.as_deref())
        .finish()
}

pub fn validate_create_vaccination(data: &CreateVaccination) -> AppResult<()> {
    Validator::new()
        .required("pet_id", &data.pet_id)
        .required("name", &data.name)
        .date_order(
            "administered_on",
            Some(data.administered_on),
            "next_due_on",
            data.next_due_on,
        )
        .notes(data.notes.as_deref())
        .finish()
}

pub fn validate_update_vaccination(
    data: &UpdateVaccination,
    stored: &Vaccination,
) -> AppResult<()> {
    Validator::new()
        .not_blank("name", data.name.as_deref())
        .date_order(
            "administered_on",
            Some(data.administered_on.unwrap_or(stored.administered_on)),
            "next_due_on",
            data.next_due_on.or(stored.next_due_on),
        )
        .notes(data.notes.as_deref())
        .finish()
}

fn weight_in_range(weight_kg: f64) -> bool {
    weight_kg.is_finite() && weight_kg > 0.0 && weight_kg < 1000.0
}

pub fn validate_create_weight(data: &CreateWeightEntry) -> AppResult<()> {
    Validator::new()
        .required("pet_id", &data.pet_id)
        .check(
            weight_in_range(data.weight_kg),
            "weight_kg must be a positive number below 1000",
        )
        .notes(data.notes.as_deref())
        .finish()
}

pub fn validate_update_weight(data: &UpdateWeightEntry) -> AppResult<()> {
    Validator::new()
        .check(
            data.weight_kg.map_or(true, weight_in_range),
            "weight_kg must be a positive number below 1000",
        )
        .notes(data.notes.as_deref())
        .finish()
}

pub fn validate_create_vet_visit(data: &CreateVetVisit) -> AppResult<()> {
    Validator::new()
        .required("pet_id", &data.pet_id)
        .required("reason", &data.reason)
        .notes(data.notes.as_deref())
        .finish()
}

pub fn validate_update_vet_visit(data: &UpdateVetVisit) -> AppResult<()> {
    Validator::new()
        .not_blank("reason", data.reason.as_deref())
        .notes(data.notes.as_deref())
        .finish()
}

pub fn validate_create_calendar_event(data: &CreateCalendarEvent) -> AppResult<()> {
    Validator::new()
        .required("pet_id", &data.pet_id)
        .required("title", &data.title)
        .time_order("starts_at", Some(data.starts_at), "ends_at", data.ends_at)
        .notes(data.description.as_deref())
        .finish()
}

pub fn validate_update_calendar_event(
    data: &UpdateCalendarEvent,
    stored: &CalendarEvent,
) -> AppResult<()> {
    Validator::new()
        .not_blank("title", data.title.as_deref())
        .time_order(
            "starts_at",
            Some(data.starts_at.unwrap_or(stored.starts_at)),
            "ends_at",
            data.ends_at.or(stored.ends_at),
        )
        .notes(data.description.as_deref())
        .finish()
}

fn validate_samples(v: &mut Validator, samples: &[CoordinateInput]) {
    for (i, s) in samples.iter().enumerate() {
        v.check(
            (-90.0..=90.0).contains(&s.latitude),
            format!("coordinates[{}].latitude must be between -90 and 90", i),
        )
        .check(
            (-180.0..=180.0).contains(&s.longitude),
            format!("coordinates[{}].longitude must be between -180 and 180", i),
        );
    }
}

pub fn validate_coordinates(samples: &[CoordinateInput]) -> AppResult<()> {
    let mut v = Validator::new();
    v.check(!samples.is_empty(), "coordinates cannot be empty");
    validate_samples(&mut v, samples);
    v.finish()
}

pub fn validate_create_route(data: &CreateRoute) -> AppResult<()> {
    let mut v = Validator::new();
    v.required("pet_id", &data.pet_id)
        .time_order("started_at", Some(data.started_at), "ended_at", data.ended_at)
        .check(
            data.distance_m.map_or(true, |d| d.is_finite() && d >= 0.0),
            "distance_m cannot be negative",
        )
        .notes(data.notes.as_deref());
    validate_samples(&mut v, &data.coordinates);
    v.finish()
}

pub fn validate_update_route(data: &UpdateRoute, stored: &Route) -> AppResult<()> {
    Validator::new()
        .time_order(
            "started_at",
            Some(data.started_at.unwrap_or(stored.started_at)),
            "ended_at",
            data.ended_at.or(stored.ended_at),
        )
        .check(
            data.distance_m.map_or(true, |d| d.is_finite() && d >= 0.0),
            "distance_m cannot be negative",
        )
        .notes(data.notes.as_deref())
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_of(result: AppResult<()>) -> Vec<String> {
        match result {
            Err(AppError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn collects_all_pet_errors() {
        let errors = errors_of(validate_create_pet(&CreatePet {
            name: " ".to_string(),
            species: String::new(),
            breed: None,
            gender: None,
            birth_date: None,
            color: None,
            microchip_id: None,
            notes: None,
        }));

        assert_eq!(errors, vec!["name is required", "species is required"]);
    }

    fn stored_medication(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Medication {
        let at = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Medication {
            id: "med".to_string(),
            pet_id: "pet".to_string(),
            name: "Carprofen".to_string(),
            dosage: None,
            frequency: None,
            start_date: start,
            end_date: end,
            notes: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn rejects_end_before_start() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let errors = errors_of(validate_update_medication(
            &UpdateMedication {
                start_date: Some(start),
                end_date: Some(end),
                ..Default::default()
            },
            &stored_medication(None, None),
        ));

        assert_eq!(errors, vec!["end_date cannot be before start_date"]);
    }

    #[test]
    fn partial_update_is_checked_against_stored_fields() {
        let stored = stored_medication(NaiveDate::from_ymd_opt(2025, 3, 10), None);

        let errors = errors_of(validate_update_medication(
            &UpdateMedication {
                end_date: NaiveDate::from_ymd_opt(2025, 3, 1),
                ..Default::default()
            },
            &stored,
        ));
        assert_eq!(errors, vec!["end_date cannot be before start_date"]);

        assert!(validate_update_medication(
            &UpdateMedication {
                end_date: NaiveDate::from_ymd_opt(2025, 3, 20),
                ..Default::default()
            },
            &stored,
        )
        .is_ok());
    }

    #[test]
    fn weight_must_be_positive() {
        assert!(validate_update_weight(&UpdateWeightEntry {
            weight_kg: Some(0.0),
            ..Default::default()
        })
        .is_err());
        assert!(validate_update_weight(&UpdateWeightEntry {
            weight_kg: Some(12.5),
            ..Default::default()
        })
        .is_ok());
    }

    #[test]
    fn coordinates_are_range_checked() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let errors = errors_of(validate_coordinates(&[
            CoordinateInput {
                latitude: 41.0,
                longitude: 29.0,
                recorded_at: at,
            },
            CoordinateInput {
                latitude: 91.0,
                longitude: 29.0,
                recorded_at: at,
            },
        ]));

        assert_eq!(errors, vec!["coordinates[1].latitude must be between -90 and 90"]);
        assert!(validate_coordinates(&[]).is_err());
    }

    #[test]
    fn account_fields() {
        let mut v = Validator::new();
        validate_email(&mut v, "not-an-email");
        validate_username(&mut v, "a b");
        validate_password(&mut v, "short");
        let errors = errors_of(v.finish());
        assert_eq!(errors.len(), 3);

        let mut v = Validator::new();
        validate_email(&mut v, "alice@example.com");
        validate_username(&mut v, "alice_01");
        validate_password(&mut v, "correct horse battery");
        assert!(v.finish().is_ok());
    }
}
