//! `quotedesk-core`: domain foundation shared by every quotedesk crate.
//!
//! Typed identifiers, the domain error model and the aggregate/entity traits.
//! No infrastructure concerns live here.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{AggregateRoot, Entity, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{ClientId, OfferId, OfferItemId, ProductId, RevisionId, SaleId, UserId};
