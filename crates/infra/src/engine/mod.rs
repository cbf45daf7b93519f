//! Offer lifecycle engine.
//!
//! Each mutating operation opens one [`UnitOfWork`], locks the rows it
//! reads, validates, writes, and commits. Any error rolls the whole
//! transaction back; nothing is retried here.

mod error;
mod lifecycle;
mod revision;
mod sale;

pub use error::OfferError;
pub use revision::CreatedRevision;

use tracing::instrument;

use quotedesk_core::{AggregateRoot, ExpectedVersion, OfferId};
use quotedesk_offers::{Offer, RevisionLink, Sale};

use crate::catalog::CatalogLookup;
use crate::config::EngineSettings;
use crate::repository::{OfferFilter, OfferPage, OfferStore, Pagination, UnitOfWork};

pub type OfferResult<T> = Result<T, OfferError>;

/// Orchestrates offer operations over a store and a catalog.
///
/// Holds no mutable state of its own; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct OfferEngine<S, C> {
    store: S,
    catalog: C,
    settings: EngineSettings,
}

impl<S, C> OfferEngine<S, C>
where
    S: OfferStore,
    C: CatalogLookup,
{
    pub fn new(store: S, catalog: C, settings: EngineSettings) -> Self {
        Self {
            store,
            catalog,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip(self), fields(offer_id = %id), err)]
    pub async fn get_offer(&self, id: OfferId) -> OfferResult<Offer> {
        self.store
            .get_offer(id)
            .await?
            .ok_or(OfferError::OfferNotFound)
    }

    #[instrument(skip(self), err)]
    pub async fn list_offers(
        &self,
        filter: &OfferFilter,
        pagination: Pagination,
    ) -> OfferResult<OfferPage> {
        Ok(self.store.list_offers(filter, pagination).await?)
    }

    /// Revision links recorded for `original`, ordered by revision number.
    #[instrument(skip(self), fields(offer_id = %original), err)]
    pub async fn revisions_of(&self, original: OfferId) -> OfferResult<Vec<RevisionLink>> {
        if self.store.get_offer(original).await?.is_none() {
            return Err(OfferError::OfferNotFound);
        }
        Ok(self.store.revisions_of(original).await?)
    }

    #[instrument(skip(self), fields(offer_id = %offer_id), err)]
    pub async fn sale_for_offer(&self, offer_id: OfferId) -> OfferResult<Option<Sale>> {
        Ok(self.store.sale_for_offer(offer_id).await?)
    }
}

/// Commit on success, roll back on failure.
async fn finish<T>(uow: Box<dyn UnitOfWork>, result: OfferResult<T>) -> OfferResult<T> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Load and lock an offer inside the transaction.
async fn load_locked(uow: &mut dyn UnitOfWork, id: OfferId) -> OfferResult<Offer> {
    uow.lock_offer(id).await?.ok_or(OfferError::OfferNotFound)
}

/// Persist the header of `offer` against the version it was loaded at.
async fn save_header(uow: &mut dyn UnitOfWork, offer: &mut Offer) -> OfferResult<()> {
    let version = uow
        .save_header(offer.header(), ExpectedVersion::Exact(offer.version()))
        .await?;
    offer.set_version(version);
    Ok(())
}
