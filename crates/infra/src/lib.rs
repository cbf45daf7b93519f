//! Infrastructure layer: offer stores, catalog lookups, the lifecycle engine
//! and configuration.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod repository;
pub mod schema;

mod integration_tests;

pub use catalog::{CatalogLookup, ClientStatus, InMemoryCatalog, PgCatalog, ProductStatus};
pub use config::{ConfigError, ConnectError, EngineSettings, StoreConfig};
pub use engine::{CreatedRevision, OfferEngine, OfferError, OfferResult};
pub use repository::{
    InMemoryOfferStore, OfferFilter, OfferPage, OfferStore, OfferSummary, Pagination, PgOfferStore,
    StoreError, UnitOfWork,
};
