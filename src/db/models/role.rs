use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Delegation role carried by sub-user links and pet share grants.
///
/// Stored and serialized as lowercase text: `owner`, `caretaker`, `veterinarian`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    /// Full mutation rights equal to the pet owner.
    Owner,
    #[default]
    Caretaker,
    Veterinarian,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Caretaker => "caretaker",
            Role::Veterinarian => "veterinarian",
        }
    }

    /// Whether holders of this role may mutate the delegating account's records.
    pub fn is_owner_equivalent(self) -> bool {
        matches!(self, Role::Owner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "caretaker" => Ok(Role::Caretaker),
            "veterinarian" => Ok(Role::Veterinarian),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}
