pub mod calendar_event;
pub mod medication;
pub mod pet;
pub mod pet_shares;
pub mod route;
pub mod sub_user_invitations;
pub mod sub_users;
pub mod user;
pub mod vaccination;
pub mod vet_visit;
pub mod weight;

pub use calendar_event::CalendarEventRepository;
pub use medication::MedicationRepository;
pub use pet::PetRepository;
pub use pet_shares::PetShareRepository;
pub use route::RouteRepository;
pub use sub_user_invitations::SubUserInvitationRepository;
pub use sub_users::SubUserRepository;
pub use user::UserRepository;
pub use vaccination::VaccinationRepository;
pub use vet_visit::VetVisitRepository;
pub use weight::WeightRepository;

/// Predicate over a `pets p` alias selecting what a "list mine" read returns:
/// pets owned by the effective account plus pets shared with the actor.
/// Binds `(effective_account_id, actor_id)`.
pub(crate) const VISIBLE_PETS_FILTER: &str =
    "(p.owner_id = ? OR p.id IN (SELECT pet_id FROM pet_shares WHERE user_id = ?))";
