//! Offer listing: filters, pagination, result page.

use serde::{Deserialize, Serialize};

use quotedesk_core::{ClientId, UserId};
use quotedesk_offers::{OfferHeader, OfferStatus};

/// Optional listing filters; `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferFilter {
    pub status: Option<OfferStatus>,
    pub client_id: Option<ClientId>,
    pub owner_id: Option<UserId>,
}

impl OfferFilter {
    pub fn matches(&self, header: &OfferHeader) -> bool {
        self.status.is_none_or(|s| s == header.status)
            && self.client_id.is_none_or(|c| c == header.client_id)
            && self.owner_id.is_none_or(|o| o == header.owner_id)
    }
}

/// Offset/limit window. Both values always fit a Postgres `BIGINT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PaginationFields")]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u64 = 50;
    pub const MAX_LIMIT: u64 = 200;
    pub const MAX_OFFSET: u64 = i64::MAX as u64;

    /// Clamp the limit into `1..=MAX_LIMIT` and the offset to `MAX_OFFSET`.
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset: offset.min(Self::MAX_OFFSET),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    /// 1-based page number, as offered by listing screens.
    pub fn page(page: u64, limit: u64) -> Self {
        let limit = limit.clamp(1, Self::MAX_LIMIT);
        Self::new(page.saturating_sub(1).saturating_mul(limit), limit)
    }
}

#[derive(Deserialize)]
struct PaginationFields {
    offset: u64,
    limit: u64,
}

impl From<PaginationFields> for Pagination {
    fn from(fields: PaginationFields) -> Self {
        Pagination::new(fields.offset, fields.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_LIMIT)
    }
}

/// Listing row: offer header plus its line count, without the items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferSummary {
    #[serde(flatten)]
    pub header: OfferHeader,
    pub item_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferPage {
    pub offers: Vec<OfferSummary>,
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl OfferPage {
    pub fn new(offers: Vec<OfferSummary>, total: u64, pagination: Pagination) -> Self {
        Self {
            has_more: total > pagination.offset.saturating_add(offers.len() as u64),
            offers,
            total,
            pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(Pagination::new(0, 0).limit, 1);
        assert_eq!(Pagination::new(0, 10_000).limit, Pagination::MAX_LIMIT);
        assert_eq!(Pagination::default().limit, Pagination::DEFAULT_LIMIT);
    }

    #[test]
    fn page_numbers_are_one_based() {
        assert_eq!(Pagination::page(1, 20).offset, 0);
        assert_eq!(Pagination::page(3, 20).offset, 40);
        assert_eq!(Pagination::page(0, 20).offset, 0);
    }

    #[test]
    fn huge_page_numbers_saturate_within_bigint() {
        let pagination = Pagination::page(u64::MAX, 200);
        assert_eq!(pagination.offset, Pagination::MAX_OFFSET);
        assert!(i64::try_from(pagination.offset).is_ok());

        let pagination = Pagination::new(u64::MAX, 20);
        assert_eq!(pagination.offset, Pagination::MAX_OFFSET);

        let page = OfferPage::new(Vec::new(), u64::MAX, pagination);
        assert!(page.has_more);
    }

    #[test]
    fn deserialized_pagination_is_clamped() {
        let pagination: Pagination =
            serde_json::from_str(r#"{"offset": 18446744073709551615, "limit": 0}"#).unwrap();
        assert_eq!(pagination, Pagination::new(Pagination::MAX_OFFSET, 1));
    }

    #[test]
    fn has_more_counts_what_was_returned() {
        let page = OfferPage::new(Vec::new(), 0, Pagination::default());
        assert!(!page.has_more);
        let page = OfferPage::new(Vec::new(), 5, Pagination::new(5, 5));
        assert!(!page.has_more);
    }
}
