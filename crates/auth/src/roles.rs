use core::str::FromStr;

use serde::{Deserialize, Serialize};

use identyflow_core::DomainError;

/// Role of a principal.
///
/// Closed set: capability is ordered `God ⊇ Admin ⊇ Instrutor`, but record
/// visibility is scoped by the `adminPai` link, not by rank alone.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    God,
    Admin,
    Instrutor,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::God, Role::Admin, Role::Instrutor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::God => "god",
            Role::Admin => "admin",
            Role::Instrutor => "instrutor",
        }
    }

    /// Capability rank; higher outranks lower.
    pub fn rank(&self) -> u8 {
        match self {
            Role::God => 2,
            Role::Admin => 1,
            Role::Instrutor => 0,
        }
    }

    pub fn is_god(&self) -> bool {
        matches!(self, Role::God)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "god" => Ok(Role::God),
            "admin" => Ok(Role::Admin),
            "instrutor" => Ok(Role::Instrutor),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}
