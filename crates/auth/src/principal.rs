use serde::{Deserialize, Serialize};

use identyflow_core::UserId;

use crate::Role;

/// Authenticated caller: identity plus role.
///
/// Derived from verified token claims by the transport layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_god(&self) -> bool {
        self.role.is_god()
    }
}
