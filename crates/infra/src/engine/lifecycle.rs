use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{Span, instrument};

use quotedesk_auth::{Actor, authorize_owner};
use quotedesk_core::{ClientId, OfferId, OfferItemId};
use quotedesk_offers::pricing::validate_tax_rate;
use quotedesk_offers::{ItemInput, LinePricing, Offer, OfferStatus};

use super::{OfferEngine, OfferError, OfferResult, finish, load_locked, save_header};
use crate::catalog::CatalogLookup;
use crate::repository::{OfferStore, UnitOfWork};

impl<S, C> OfferEngine<S, C>
where
    S: OfferStore,
    C: CatalogLookup,
{
    /// Create an empty draft owned by `actor`.
    ///
    /// `tax_rate` falls back to the configured default. The offer number is
    /// allocated inside the transaction with the owner's numbering locked.
    #[instrument(
        skip(self, actor),
        fields(actor_id = %actor.id, client_id = %client_id, offer_id, offer_number),
        err
    )]
    pub async fn create_offer(
        &self,
        actor: &Actor,
        client_id: ClientId,
        tax_rate: Option<Decimal>,
    ) -> OfferResult<Offer> {
        let tax_rate = validate_tax_rate(tax_rate.unwrap_or(self.settings.default_tax_rate))?;

        let client = self.catalog.client_active_by_id(client_id).await?;
        if !client.is_usable() {
            return Err(OfferError::ClientNotFound);
        }

        let mut uow = self.store.begin().await?;
        let result = create_in(&mut *uow, actor, client_id, tax_rate).await;
        let offer = finish(uow, result).await?;

        let span = Span::current();
        span.record("offer_id", tracing::field::display(offer.id_typed()));
        span.record("offer_number", offer.offer_number());
        tracing::info!("offer created");
        Ok(offer)
    }

    /// Append a line. An omitted unit price is taken from the product catalog.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id, offer_id = %offer_id), err)]
    pub async fn add_item(
        &self,
        actor: &Actor,
        offer_id: OfferId,
        input: ItemInput,
    ) -> OfferResult<Offer> {
        let mut uow = self.store.begin().await?;
        let result = self.add_item_in(&mut *uow, actor, offer_id, &input).await;
        finish(uow, result).await
    }

    #[instrument(
        skip(self, actor),
        fields(actor_id = %actor.id, offer_id = %offer_id, item_id = %item_id),
        err
    )]
    pub async fn update_item(
        &self,
        actor: &Actor,
        offer_id: OfferId,
        item_id: OfferItemId,
        quantity: Decimal,
        unit_price: Decimal,
        discount_percent: Decimal,
    ) -> OfferResult<Offer> {
        let mut uow = self.store.begin().await?;
        let result: OfferResult<Offer> = async {
            let mut offer = writable(&mut *uow, actor, offer_id).await?;
            let pricing = LinePricing::new(quantity, unit_price, discount_percent)?;

            let item = offer.update_item(item_id, pricing, Utc::now())?.clone();
            uow.update_item(&item).await?;
            save_header(&mut *uow, &mut offer).await?;
            Ok(offer)
        }
        .await;
        finish(uow, result).await
    }

    #[instrument(
        skip(self, actor),
        fields(actor_id = %actor.id, offer_id = %offer_id, item_id = %item_id),
        err
    )]
    pub async fn remove_item(
        &self,
        actor: &Actor,
        offer_id: OfferId,
        item_id: OfferItemId,
    ) -> OfferResult<Offer> {
        let mut uow = self.store.begin().await?;
        let result: OfferResult<Offer> = async {
            let mut offer = writable(&mut *uow, actor, offer_id).await?;

            offer.remove_item(item_id, Utc::now())?;
            uow.delete_item(offer_id, item_id).await?;
            save_header(&mut *uow, &mut offer).await?;
            Ok(offer)
        }
        .await;
        finish(uow, result).await
    }

    /// Lock the offer for good and move it to `locked`.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id, offer_id = %offer_id), err)]
    pub async fn lock(&self, actor: &Actor, offer_id: OfferId) -> OfferResult<Offer> {
        let mut uow = self.store.begin().await?;
        let result: OfferResult<Offer> = async {
            let mut offer = writable(&mut *uow, actor, offer_id).await?;

            offer.lock(Utc::now())?;
            save_header(&mut *uow, &mut offer).await?;
            Ok(offer)
        }
        .await;
        let offer = finish(uow, result).await?;

        tracing::info!(total_with_tax = %offer.totals().total_with_tax, "offer locked");
        Ok(offer)
    }

    /// Change the display status. The lock flag is left as it is.
    #[instrument(
        skip(self, actor),
        fields(actor_id = %actor.id, offer_id = %offer_id, status = %status),
        err
    )]
    pub async fn set_status(
        &self,
        actor: &Actor,
        offer_id: OfferId,
        status: &str,
    ) -> OfferResult<Offer> {
        let status: OfferStatus = status.parse()?;

        let mut uow = self.store.begin().await?;
        let result: OfferResult<Offer> = async {
            let mut offer = load_locked(&mut *uow, offer_id).await?;
            authorize_owner(actor, offer.owner_id())?;

            offer.set_status(status, Utc::now());
            save_header(&mut *uow, &mut offer).await?;
            Ok(offer)
        }
        .await;
        finish(uow, result).await
    }

    async fn add_item_in(
        &self,
        uow: &mut dyn UnitOfWork,
        actor: &Actor,
        offer_id: OfferId,
        input: &ItemInput,
    ) -> OfferResult<Offer> {
        let mut offer = writable(uow, actor, offer_id).await?;

        let product = self.catalog.product_active_by_id(input.product_id).await?;
        if !product.is_usable() {
            return Err(OfferError::ProductNotFound);
        }
        let pricing = input.pricing(product.price)?;

        let item = offer
            .add_item(OfferItemId::new(), input.product_id, pricing, Utc::now())?
            .clone();
        uow.insert_item(&item).await?;
        save_header(uow, &mut offer).await?;
        Ok(offer)
    }
}

async fn create_in(
    uow: &mut dyn UnitOfWork,
    actor: &Actor,
    client_id: ClientId,
    tax_rate: Decimal,
) -> OfferResult<Offer> {
    let number = uow.next_offer_number(actor.id).await?;
    let mut offer = Offer::draft(OfferId::new(), number, actor.id, client_id, tax_rate, Utc::now())?;
    uow.insert_offer(&offer).await?;
    offer.set_version(1);
    Ok(offer)
}

/// Lock an offer for item mutation: it must exist, be unlocked and belong to
/// the actor (or the actor must be privileged), checked in that order.
async fn writable(uow: &mut dyn UnitOfWork, actor: &Actor, offer_id: OfferId) -> OfferResult<Offer> {
    let offer = load_locked(uow, offer_id).await?;
    offer.ensure_unlocked()?;
    authorize_owner(actor, offer.owner_id())?;
    Ok(offer)
}
