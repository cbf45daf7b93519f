use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::instrument;

use quotedesk_core::{ClientId, ProductId};

use super::{CatalogLookup, ClientStatus, ProductStatus};
use crate::repository::StoreError;
use crate::repository::postgres::map_sqlx_error;

/// Catalog lookups against the `clients` and `products` tables.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: Arc<PgPool>,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl CatalogLookup for PgCatalog {
    #[instrument(skip(self), fields(client_id = %id), err)]
    async fn client_active_by_id(&self, id: ClientId) -> Result<ClientStatus, StoreError> {
        let row = sqlx::query("SELECT is_active FROM clients WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("client_active_by_id", e))?;

        match row {
            Some(row) => {
                let active: bool = row
                    .try_get("is_active")
                    .map_err(|e| StoreError::Corrupt(format!("failed to read client: {e}")))?;
                Ok(ClientStatus { exists: true, active })
            }
            None => Ok(ClientStatus::default()),
        }
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product_active_by_id(&self, id: ProductId) -> Result<ProductStatus, StoreError> {
        let row = sqlx::query("SELECT is_active, price FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("product_active_by_id", e))?;

        match row {
            Some(row) => {
                let active: bool = row
                    .try_get("is_active")
                    .map_err(|e| StoreError::Corrupt(format!("failed to read product: {e}")))?;
                let price: Option<Decimal> = row
                    .try_get("price")
                    .map_err(|e| StoreError::Corrupt(format!("failed to read product price: {e}")))?;
                Ok(ProductStatus {
                    exists: true,
                    active,
                    price,
                })
            }
            None => Ok(ProductStatus::default()),
        }
    }
}
