//! Offers domain module.
//!
//! Business rules for priced quotations: the pricing calculator, the offer
//! aggregate with its line items, revision lineage and sale conversion.
//! Deterministic domain logic only (no IO, no HTTP, no storage).

pub mod offer;
pub mod pricing;
pub mod revision;
pub mod sale;

pub use offer::{ItemInput, Offer, OfferHeader, OfferItem, OfferStatus};
pub use pricing::{LinePricing, OfferTotals};
pub use revision::RevisionLink;
pub use sale::Sale;
