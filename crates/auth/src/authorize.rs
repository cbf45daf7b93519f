use thiserror::Error;

use quotedesk_core::UserId;

use crate::Actor;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: actor {actor} does not own the offer")]
    Forbidden { actor: UserId },
}

/// Ownership policy shared by every offer mutation.
///
/// The owner may always act; anyone else needs a privileged role.
/// Pure check, no IO.
pub fn authorize_owner(actor: &Actor, owner: UserId) -> Result<(), AuthzError> {
    if actor.id == owner || actor.is_privileged() {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { actor: actor.id })
    }
}
