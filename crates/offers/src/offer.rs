use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use quotedesk_core::{
    AggregateRoot, ClientId, DomainError, DomainResult, Entity, OfferId, OfferItemId, ProductId,
    UserId,
};

use crate::pricing::{LinePricing, OfferTotals, validate_tax_rate};

/// Display status of an offer.
///
/// Independent of [`OfferHeader::is_locked`]: the lock flag alone gates item
/// mutation, the status is free to move between any of these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Draft,
    Locked,
    Past,
    Rejected,
    Questionable,
}

impl OfferStatus {
    pub const ALL: [OfferStatus; 5] = [
        OfferStatus::Draft,
        OfferStatus::Locked,
        OfferStatus::Past,
        OfferStatus::Rejected,
        OfferStatus::Questionable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Draft => "draft",
            OfferStatus::Locked => "locked",
            OfferStatus::Past => "past",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Questionable => "questionable",
        }
    }
}

impl core::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OfferStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OfferStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::invalid_status(s))
    }
}

/// One priced line of an offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferItem {
    pub id: OfferItemId,
    #[serde(skip)]
    pub offer_id: OfferId,
    /// 1-based position; copied verbatim into revisions.
    pub line_no: u32,
    pub product_id: ProductId,
    #[serde(flatten)]
    pub pricing: LinePricing,
    pub line_total: Decimal,
}

impl OfferItem {
    fn new(id: OfferItemId, offer_id: OfferId, line_no: u32, product_id: ProductId, pricing: LinePricing) -> Self {
        Self {
            id,
            offer_id,
            line_no,
            product_id,
            line_total: pricing.line_total(),
            pricing,
        }
    }
}

impl Entity for OfferItem {
    type Id = OfferItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Caller-supplied line for `add_item`.
///
/// `unit_price` may be omitted, in which case the catalog price of the
/// product is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInput {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub discount_percent: Decimal,
}

impl ItemInput {
    pub fn new(product_id: ProductId, quantity: Decimal, unit_price: Decimal, discount_percent: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            unit_price: Some(unit_price),
            discount_percent,
        }
    }

    /// Resolve against the catalog price and validate.
    pub fn pricing(&self, catalog_price: Option<Decimal>) -> DomainResult<LinePricing> {
        let unit_price = self
            .unit_price
            .or(catalog_price)
            .ok_or_else(|| DomainError::invalid_input("unit_price is required: product has no catalog price"))?;
        LinePricing::new(self.quantity, unit_price, self.discount_percent)
    }
}

/// The `offers` row: everything except the line items.
///
/// Serialize-only: totals are derived from items and are never accepted from
/// outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferHeader {
    pub id: OfferId,
    /// Per-owner sequence number, starting at 1.
    pub offer_number: u64,
    #[serde(rename = "user_id")]
    pub owner_id: UserId,
    pub client_id: ClientId,
    pub tax_rate: Decimal,
    pub status: OfferStatus,
    pub is_locked: bool,
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub totals: OfferTotals,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: u64,
}

impl OfferHeader {
    /// Human-facing number, `"{owner}-{n}"`.
    pub fn display_number(&self) -> String {
        format!("{}-{}", self.owner_id, self.offer_number)
    }
}

/// Aggregate root: Offer with its line items.
///
/// Every mutation recomputes the stored totals before returning, so a
/// persisted offer can never carry totals that disagree with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Offer {
    #[serde(flatten)]
    header: OfferHeader,
    items: Vec<OfferItem>,
}

impl Offer {
    /// New unlocked draft with zero totals.
    pub fn draft(
        id: OfferId,
        offer_number: u64,
        owner_id: UserId,
        client_id: ClientId,
        tax_rate: Decimal,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let tax_rate = validate_tax_rate(tax_rate)?;
        Ok(Self {
            header: OfferHeader {
                id,
                offer_number,
                owner_id,
                client_id,
                tax_rate,
                status: OfferStatus::Draft,
                is_locked: false,
                locked_at: None,
                totals: OfferTotals::default(),
                created_at: now,
                updated_at: now,
                version: 0,
            },
            items: Vec::new(),
        })
    }

    /// Reassemble an offer loaded from storage. Items are ordered by line number.
    pub fn from_storage(header: OfferHeader, mut items: Vec<OfferItem>) -> Self {
        items.sort_by_key(|item| item.line_no);
        Self { header, items }
    }

    /// A draft revision of `original` owned by `owner_id`: same client and
    /// tax rate, every line copied in order under fresh item ids.
    pub fn revision_of(
        original: &Offer,
        id: OfferId,
        offer_number: u64,
        owner_id: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut revision = Self::draft(
            id,
            offer_number,
            owner_id,
            original.header.client_id,
            original.header.tax_rate,
            now,
        )?;
        revision.items = original
            .items
            .iter()
            .map(|item| OfferItem {
                id: OfferItemId::new(),
                offer_id: id,
                ..item.clone()
            })
            .collect();
        revision.header.totals = revision.totals_over(revision.items.iter().map(|item| &item.pricing))?;
        Ok(revision)
    }

    pub fn header(&self) -> &OfferHeader {
        &self.header
    }

    pub fn into_parts(self) -> (OfferHeader, Vec<OfferItem>) {
        (self.header, self.items)
    }

    pub fn id_typed(&self) -> OfferId {
        self.header.id
    }

    pub fn owner_id(&self) -> UserId {
        self.header.owner_id
    }

    pub fn client_id(&self) -> ClientId {
        self.header.client_id
    }

    pub fn offer_number(&self) -> u64 {
        self.header.offer_number
    }

    pub fn tax_rate(&self) -> Decimal {
        self.header.tax_rate
    }

    pub fn status(&self) -> OfferStatus {
        self.header.status
    }

    pub fn is_locked(&self) -> bool {
        self.header.is_locked
    }

    pub fn locked_at(&self) -> Option<DateTime<Utc>> {
        self.header.locked_at
    }

    pub fn totals(&self) -> &OfferTotals {
        &self.header.totals
    }

    pub fn items(&self) -> &[OfferItem] {
        &self.items
    }

    pub fn item(&self, item_id: OfferItemId) -> Option<&OfferItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Called by stores after a successful write.
    pub fn set_version(&mut self, version: u64) {
        self.header.version = version;
    }

    pub fn ensure_unlocked(&self) -> DomainResult<()> {
        if self.header.is_locked {
            return Err(DomainError::OfferLocked);
        }
        Ok(())
    }

    pub fn add_item(
        &mut self,
        item_id: OfferItemId,
        product_id: ProductId,
        pricing: LinePricing,
        now: DateTime<Utc>,
    ) -> DomainResult<&OfferItem> {
        self.ensure_unlocked()?;

        let line_no = self.items.iter().map(|item| item.line_no).max().unwrap_or(0) + 1;
        let item = OfferItem::new(item_id, self.header.id, line_no, product_id, pricing);
        let totals = self.totals_over(
            self.items
                .iter()
                .map(|item| &item.pricing)
                .chain(std::iter::once(&item.pricing)),
        )?;

        self.items.push(item);
        self.touch(totals, now);

        let index = self.items.len() - 1;
        Ok(&self.items[index])
    }

    pub fn update_item(
        &mut self,
        item_id: OfferItemId,
        pricing: LinePricing,
        now: DateTime<Utc>,
    ) -> DomainResult<&OfferItem> {
        self.ensure_unlocked()?;

        let index = self.position(item_id)?;
        let totals = self.totals_over(
            self.items
                .iter()
                .enumerate()
                .map(|(i, item)| if i == index { &pricing } else { &item.pricing }),
        )?;

        let item = &mut self.items[index];
        item.pricing = pricing;
        item.line_total = pricing.line_total();
        self.touch(totals, now);

        Ok(&self.items[index])
    }

    pub fn remove_item(&mut self, item_id: OfferItemId, now: DateTime<Utc>) -> DomainResult<OfferItem> {
        self.ensure_unlocked()?;

        let index = self.position(item_id)?;
        let totals = self.totals_over(
            self.items
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, item)| &item.pricing),
        )?;

        let removed = self.items.remove(index);
        self.touch(totals, now);

        Ok(removed)
    }

    /// One-way lock. Also moves the status to `locked`.
    pub fn lock(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_unlocked()?;
        if self.items.is_empty() {
            return Err(DomainError::EmptyOffer);
        }

        self.header.is_locked = true;
        self.header.locked_at = Some(now);
        self.header.status = OfferStatus::Locked;
        self.header.updated_at = now;
        Ok(())
    }

    /// Change the display status. Never touches the lock flag.
    pub fn set_status(&mut self, status: OfferStatus, now: DateTime<Utc>) {
        self.header.status = status;
        self.header.updated_at = now;
    }

    fn position(&self, item_id: OfferItemId) -> DomainResult<usize> {
        self.items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(DomainError::ItemNotFound)
    }

    /// Stored totals for a prospective set of lines. Computed before any
    /// mutation so a rejected change leaves the offer untouched.
    fn totals_over<'a>(&self, lines: impl IntoIterator<Item = &'a LinePricing>) -> DomainResult<OfferTotals> {
        Ok(OfferTotals::recalculate(lines, self.header.tax_rate)?.for_storage())
    }

    fn touch(&mut self, totals: OfferTotals, now: DateTime<Utc>) {
        self.header.totals = totals;
        self.header.updated_at = now;
    }
}

impl AggregateRoot for Offer {
    type Id = OfferId;

    fn id(&self) -> &Self::Id {
        &self.header.id
    }

    fn version(&self) -> u64 {
        self.header.version
    }
}
