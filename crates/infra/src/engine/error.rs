use thiserror::Error;

use quotedesk_auth::AuthzError;
use quotedesk_core::DomainError;

use crate::repository::StoreError;

/// Failure of an offer engine operation.
///
/// Every variant except `TransientStore` and `Store` is raised before the
/// transaction writes anything.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OfferError {
    #[error("offer not found")]
    OfferNotFound,

    #[error("client not found or inactive")]
    ClientNotFound,

    #[error("product not found or inactive")]
    ProductNotFound,

    #[error("offer item not found")]
    ItemNotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("offer is locked")]
    OfferLocked,

    #[error("offer has no items")]
    EmptyOffer,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("a sale was already recorded for this offer")]
    SaleExists,

    #[error("offer is not locked")]
    OfferNotLocked,

    /// Rolled back by the store; the whole operation may be retried.
    #[error("transient store failure: {0}")]
    TransientStore(String),

    #[error("store failure: {0}")]
    Store(String),
}

impl OfferError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, OfferError::TransientStore(_))
    }
}

impl From<DomainError> for OfferError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidInput(msg) | DomainError::InvalidId(msg) => OfferError::InvalidInput(msg),
            DomainError::InvalidStatus(status) => OfferError::InvalidStatus(status),
            DomainError::OfferLocked => OfferError::OfferLocked,
            DomainError::EmptyOffer => OfferError::EmptyOffer,
            DomainError::OfferNotLocked => OfferError::OfferNotLocked,
            DomainError::ItemNotFound => OfferError::ItemNotFound,
            DomainError::Conflict(msg) => OfferError::TransientStore(msg),
        }
    }
}

impl From<AuthzError> for OfferError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Forbidden { .. } => OfferError::Forbidden,
        }
    }
}

impl From<StoreError> for OfferError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(msg) | StoreError::Conflict(msg) => OfferError::TransientStore(msg),
            other => OfferError::Store(other.to_string()),
        }
    }
}
