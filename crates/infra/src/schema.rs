//! Offer store schema.

use sqlx::PgPool;

use crate::repository::StoreError;
use crate::repository::postgres::map_sqlx_error;

/// Idempotent DDL for the offer tables.
pub const OFFERS_SCHEMA: &str = include_str!("../migrations/0001_offers.sql");

/// Create any missing tables, constraints and indexes.
pub async fn apply(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(OFFERS_SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("apply_schema", e))?;
    tracing::info!("offer schema applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_the_uniqueness_guards() {
        assert!(OFFERS_SCHEMA.contains("UNIQUE (owner_id, offer_number)"));
        assert!(OFFERS_SCHEMA.contains("UNIQUE (original_offer_id, revision_number)"));
        assert!(OFFERS_SCHEMA.contains("UUID NOT NULL UNIQUE REFERENCES offers (id)"));
        assert!(OFFERS_SCHEMA.contains("ON DELETE CASCADE"));
    }
}
