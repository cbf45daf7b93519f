use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use quotedesk_core::{DomainError, DomainResult, OfferId, SaleId};

use crate::offer::Offer;

/// A locked offer converted into a recorded sale. At most one per offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub offer_id: OfferId,
    pub sale_date: NaiveDate,
    /// Stored `total_with_tax` of the offer at conversion time.
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    pub fn from_locked_offer(
        offer: &Offer,
        sale_date: NaiveDate,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !offer.is_locked() {
            return Err(DomainError::OfferNotLocked);
        }

        Ok(Self {
            id: SaleId::new(),
            offer_id: offer.id_typed(),
            sale_date,
            total_amount: offer.totals().total_with_tax,
            notes,
            created_at: now,
        })
    }
}
