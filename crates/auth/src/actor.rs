use serde::{Deserialize, Serialize};

use quotedesk_core::UserId;

use crate::Role;

/// Authenticated identity performing an offer operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// Sales representative without elevated rights.
    pub fn user(id: UserId) -> Self {
        Self::new(id, Role::user())
    }

    pub fn admin(id: UserId) -> Self {
        Self::new(id, Role::admin())
    }

    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }
}
