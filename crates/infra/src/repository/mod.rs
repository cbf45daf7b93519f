//! Offer persistence boundary.
//!
//! [`OfferStore`] serves committed reads; all writes go through a
//! [`UnitOfWork`] so that every offer operation commits or rolls back as one
//! transaction.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryOfferStore;
pub use postgres::{PgOfferStore, PgUnitOfWork};
pub use query::{OfferFilter, OfferPage, OfferSummary, Pagination};
pub use r#trait::{OfferStore, StoreError, UnitOfWork};
