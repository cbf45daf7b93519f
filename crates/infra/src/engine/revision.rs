use chrono::Utc;
use serde::Serialize;
use tracing::{Span, instrument};

use quotedesk_auth::{Actor, authorize_owner};
use quotedesk_core::{OfferId, UserId};
use quotedesk_offers::{Offer, RevisionLink};

use super::{OfferEngine, OfferResult, finish, load_locked};
use crate::catalog::CatalogLookup;
use crate::repository::{OfferStore, UnitOfWork};

/// Result of [`OfferEngine::create_revision`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedRevision {
    /// The new draft.
    pub offer: Offer,
    pub link: RevisionLink,
}

impl<S, C> OfferEngine<S, C>
where
    S: OfferStore,
    C: CatalogLookup,
{
    /// Branch `offer_id` into a new unlocked draft owned by `actor`.
    ///
    /// The original stays row-locked for the whole transaction, which is what
    /// keeps revision numbers of one original strictly increasing. The
    /// original may itself be locked.
    #[instrument(
        skip(self, actor),
        fields(actor_id = %actor.id, offer_id = %offer_id, revision_offer_id, revision_number),
        err
    )]
    pub async fn create_revision(
        &self,
        actor: &Actor,
        offer_id: OfferId,
    ) -> OfferResult<CreatedRevision> {
        let mut uow = self.store.begin().await?;
        let result = revise_in(&mut *uow, actor, offer_id).await;
        let created = finish(uow, result).await?;

        let span = Span::current();
        span.record("revision_offer_id", tracing::field::display(created.offer.id_typed()));
        span.record("revision_number", created.link.revision_number);
        tracing::info!("revision created");
        Ok(created)
    }
}

async fn revise_in(
    uow: &mut dyn UnitOfWork,
    actor: &Actor,
    offer_id: OfferId,
) -> OfferResult<CreatedRevision> {
    let original = load_locked(uow, offer_id).await?;
    authorize_owner(actor, original.owner_id())?;

    let owner: UserId = actor.id;
    let now = Utc::now();
    let number = uow.next_offer_number(owner).await?;
    let mut offer = Offer::revision_of(&original, OfferId::new(), number, owner, now)?;
    uow.insert_offer(&offer).await?;
    offer.set_version(1);

    let current = uow.max_revision_number(offer_id).await?;
    let link = RevisionLink::next(offer_id, offer.id_typed(), current, now);
    uow.insert_revision(&link).await?;

    Ok(CreatedRevision { offer, link })
}
