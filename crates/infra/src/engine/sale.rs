use chrono::{NaiveDate, Utc};
use tracing::instrument;

use quotedesk_auth::{Actor, authorize_owner};
use quotedesk_core::OfferId;
use quotedesk_offers::Sale;

use super::{OfferEngine, OfferError, OfferResult, finish, load_locked};
use crate::catalog::CatalogLookup;
use crate::repository::{OfferStore, UnitOfWork};

impl<S, C> OfferEngine<S, C>
where
    S: OfferStore,
    C: CatalogLookup,
{
    /// Convert a locked offer into a sale for its taxed total.
    ///
    /// At most one sale per offer: the offer row lock serializes concurrent
    /// recordings and the second one sees the first sale.
    #[instrument(skip(self, actor, notes), fields(actor_id = %actor.id, offer_id = %offer_id), err)]
    pub async fn record_sale(
        &self,
        actor: &Actor,
        offer_id: OfferId,
        sale_date: NaiveDate,
        notes: Option<String>,
    ) -> OfferResult<Sale> {
        let mut uow = self.store.begin().await?;
        let result = sell_in(&mut *uow, actor, offer_id, sale_date, notes).await;
        let sale = finish(uow, result).await?;

        tracing::info!(sale_id = %sale.id, total_amount = %sale.total_amount, "sale recorded");
        Ok(sale)
    }
}

async fn sell_in(
    uow: &mut dyn UnitOfWork,
    actor: &Actor,
    offer_id: OfferId,
    sale_date: NaiveDate,
    notes: Option<String>,
) -> OfferResult<Sale> {
    let offer = load_locked(uow, offer_id).await?;
    authorize_owner(actor, offer.owner_id())?;

    let sale = Sale::from_locked_offer(&offer, sale_date, notes, Utc::now())?;
    if uow.sale_for_offer(offer_id).await?.is_some() {
        return Err(OfferError::SaleExists);
    }
    uow.insert_sale(&sale).await?;
    Ok(sale)
}
