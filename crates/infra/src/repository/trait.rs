use std::sync::Arc;

use thiserror::Error;

use quotedesk_core::{ExpectedVersion, OfferId, OfferItemId, UserId};
use quotedesk_offers::{Offer, OfferHeader, OfferItem, RevisionLink, Sale};

use super::query::{OfferFilter, OfferPage, Pagination};

/// Offer store operation error.
///
/// Infrastructure failures only; business rule violations are `DomainError`s
/// raised before anything reaches the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Deadlock, serialization failure, pool exhaustion, lost connection.
    /// The transaction was rolled back and may be retried as a whole.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// A write raced another transaction (stale version, duplicate key).
    #[error("write conflict: {0}")]
    Conflict(String),

    /// A row the transaction expected to exist was not there.
    #[error("row missing: {0}")]
    Missing(String),

    /// A stored row could not be decoded into the domain model.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_) | StoreError::Conflict(_))
    }
}

/// Transactional offer store.
///
/// Reads run against committed state without locks. Every write goes through
/// a [`UnitOfWork`] obtained from [`OfferStore::begin`].
#[async_trait::async_trait]
pub trait OfferStore: Send + Sync {
    /// Open a transaction.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Offer with its items, ordered by line number.
    async fn get_offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError>;

    /// Newest first.
    async fn list_offers(
        &self,
        filter: &OfferFilter,
        pagination: Pagination,
    ) -> Result<OfferPage, StoreError>;

    /// Revision links of `original`, ordered by revision number.
    async fn revisions_of(&self, original: OfferId) -> Result<Vec<RevisionLink>, StoreError>;

    async fn sale_for_offer(&self, offer_id: OfferId) -> Result<Option<Sale>, StoreError>;
}

/// One open transaction against the offer store.
///
/// Nothing written through a unit of work is visible to other readers until
/// [`UnitOfWork::commit`] returns. Dropping it without committing discards
/// every write.
///
/// Implementations must:
/// - hold an exclusive lock on an offer from [`UnitOfWork::lock_offer`] until
///   the transaction ends
/// - serialize [`UnitOfWork::next_offer_number`] per owner until the
///   transaction ends
/// - reject [`UnitOfWork::save_header`] when the stored version differs from
///   the expectation
#[async_trait::async_trait]
pub trait UnitOfWork: Send {
    /// Load an offer with its items and lock it for the rest of the transaction.
    async fn lock_offer(&mut self, id: OfferId) -> Result<Option<Offer>, StoreError>;

    /// `max(offer_number for owner) + 1`, with the owner's numbering locked.
    async fn next_offer_number(&mut self, owner: UserId) -> Result<u64, StoreError>;

    /// Insert a new offer row and all of its items.
    async fn insert_offer(&mut self, offer: &Offer) -> Result<(), StoreError>;

    /// Write status, lock and total fields. Returns the new version.
    async fn save_header(
        &mut self,
        header: &OfferHeader,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError>;

    async fn insert_item(&mut self, item: &OfferItem) -> Result<(), StoreError>;

    async fn update_item(&mut self, item: &OfferItem) -> Result<(), StoreError>;

    async fn delete_item(&mut self, offer_id: OfferId, item_id: OfferItemId) -> Result<(), StoreError>;

    /// Highest revision number recorded for `original`, if any.
    ///
    /// Callers lock `original` first; that lock is what serializes numbering.
    async fn max_revision_number(&mut self, original: OfferId) -> Result<Option<u32>, StoreError>;

    async fn insert_revision(&mut self, link: &RevisionLink) -> Result<(), StoreError>;

    async fn sale_for_offer(&mut self, offer_id: OfferId) -> Result<Option<Sale>, StoreError>;

    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> OfferStore for Arc<S>
where
    S: OfferStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        (**self).begin().await
    }

    async fn get_offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        (**self).get_offer(id).await
    }

    async fn list_offers(
        &self,
        filter: &OfferFilter,
        pagination: Pagination,
    ) -> Result<OfferPage, StoreError> {
        (**self).list_offers(filter, pagination).await
    }

    async fn revisions_of(&self, original: OfferId) -> Result<Vec<RevisionLink>, StoreError> {
        (**self).revisions_of(original).await
    }

    async fn sale_for_offer(&self, offer_id: OfferId) -> Result<Option<Sale>, StoreError> {
        (**self).sale_for_offer(offer_id).await
    }
}
