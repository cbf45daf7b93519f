//! Read-only view of the client and product catalogs.
//!
//! The offer engine never writes clients or products; it only asks whether
//! they exist, whether they are active and, for products, what they cost.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use rust_decimal::Decimal;

use quotedesk_core::{ClientId, ProductId};

use crate::repository::StoreError;

pub use in_memory::InMemoryCatalog;
pub use postgres::PgCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientStatus {
    pub exists: bool,
    pub active: bool,
}

impl ClientStatus {
    pub fn is_usable(&self) -> bool {
        self.exists && self.active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProductStatus {
    pub exists: bool,
    pub active: bool,
    /// Catalog list price, used when a line omits its unit price.
    pub price: Option<Decimal>,
}

impl ProductStatus {
    pub fn is_usable(&self) -> bool {
        self.exists && self.active
    }
}

#[async_trait::async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn client_active_by_id(&self, id: ClientId) -> Result<ClientStatus, StoreError>;

    async fn product_active_by_id(&self, id: ProductId) -> Result<ProductStatus, StoreError>;
}

#[async_trait::async_trait]
impl<C> CatalogLookup for Arc<C>
where
    C: CatalogLookup + ?Sized,
{
    async fn client_active_by_id(&self, id: ClientId) -> Result<ClientStatus, StoreError> {
        (**self).client_active_by_id(id).await
    }

    async fn product_active_by_id(&self, id: ProductId) -> Result<ProductStatus, StoreError> {
        (**self).product_active_by_id(id).await
    }
}
