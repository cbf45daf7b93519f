//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic business failure raised by pure domain code.
///
/// Everything here is detected before a single row is written; storage and
/// transport failures are modelled in the infrastructure crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A quantity, price, discount or tax rate is out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A status string outside the closed offer status set.
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Item mutation or re-lock attempted on a locked offer.
    #[error("offer is locked")]
    OfferLocked,

    /// Lock attempted on an offer without items.
    #[error("offer has no items")]
    EmptyOffer,

    /// Operation requires a locked offer (e.g. recording a sale).
    #[error("offer is not locked")]
    OfferNotLocked,

    /// The referenced line item is not part of the offer.
    #[error("offer item not found")]
    ItemNotFound,

    /// Stale version or duplicate write.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_status(msg: impl Into<String>) -> Self {
        Self::InvalidStatus(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
