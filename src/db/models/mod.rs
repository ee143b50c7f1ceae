//! Database models, one file per table (plus the shared `Role` vocabulary).
//! Everything is re-exported at `crate::db::models` so callers can simply
//! `use crate::db::models::*;`.

pub mod calendar;
pub mod medication;
pub mod pet;
pub mod role;
pub mod route;
pub mod share;
pub mod sub_user;
pub mod user;
pub mod vaccination;
pub mod vet_visit;
pub mod weight;

pub use self::calendar::*;
pub use self::medication::*;
pub use self::pet::*;
pub use self::role::*;
pub use self::route::*;
pub use self::share::*;
pub use self::sub_user::*;
pub use self::user::*;
pub use self::vaccination::*;
pub use self::vet_visit::*;
pub use self::weight::*;
