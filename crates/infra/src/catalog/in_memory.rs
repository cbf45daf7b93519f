use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use rust_decimal::Decimal;

use quotedesk_core::{ClientId, ProductId};

use super::{CatalogLookup, ClientStatus, ProductStatus};
use crate::repository::StoreError;

#[derive(Debug, Clone, Copy)]
struct ProductEntry {
    active: bool,
    price: Option<Decimal>,
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    clients: RwLock<HashMap<ClientId, bool>>,
    products: RwLock<HashMap<ProductId, ProductEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form. The catalog is still exclusively owned here, so a
    /// poisoned lock is recovered instead of dropping the entry.
    pub fn with_client(mut self, id: ClientId, active: bool) -> Self {
        self.clients
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, active);
        self
    }

    pub fn with_product(mut self, id: ProductId, active: bool, price: Option<Decimal>) -> Self {
        self.products
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, ProductEntry { active, price });
        self
    }

    pub fn put_client(&self, id: ClientId, active: bool) -> Result<(), StoreError> {
        self.clients
            .write()
            .map_err(|_| poisoned())?
            .insert(id, active);
        Ok(())
    }

    pub fn put_product(&self, id: ProductId, active: bool, price: Option<Decimal>) -> Result<(), StoreError> {
        self.products
            .write()
            .map_err(|_| poisoned())?
            .insert(id, ProductEntry { active, price });
        Ok(())
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn client_active_by_id(&self, id: ClientId) -> Result<ClientStatus, StoreError> {
        let clients = self
            .clients
            .read()
            .map_err(|_| poisoned())?;
        Ok(match clients.get(&id) {
            Some(&active) => ClientStatus { exists: true, active },
            None => ClientStatus::default(),
        })
    }

    async fn product_active_by_id(&self, id: ProductId) -> Result<ProductStatus, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| poisoned())?;
        Ok(match products.get(&id) {
            Some(entry) => ProductStatus {
                exists: true,
                active: entry.active,
                price: entry.price,
            },
            None => ProductStatus::default(),
        })
    }
}
