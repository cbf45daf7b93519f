//! Postgres-backed offer store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database | `40001` | `Transient` | Serialization failure |
//! | Database | `40P01` | `Transient` | Deadlock detected |
//! | Database | `55P03` | `Transient` | Lock not available |
//! | Database | `23505` | `Conflict` | Duplicate offer number, line number, revision number or sale |
//! | Database | Any other | `Backend` | Check/foreign key violations, bad SQL |
//! | PoolTimedOut, PoolClosed, Io | N/A | `Transient` | Pool exhaustion, lost connection |
//! | Other | N/A | `Backend` | Everything else |
//!
//! ## Locking
//!
//! - `lock_offer` takes `SELECT ... FOR UPDATE` on the offer row.
//! - `next_offer_number` takes a transaction-scoped advisory lock keyed on the
//!   owner before reading `MAX(offer_number)`, so two transactions numbering
//!   for the same owner queue up instead of reading the same maximum.
//! - Revision numbering relies on the row lock of the original offer.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::{FromRow, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::{Span, instrument};

use quotedesk_core::{
    ClientId, ExpectedVersion, OfferId, OfferItemId, ProductId, RevisionId, SaleId, UserId,
};
use quotedesk_offers::{
    LinePricing, Offer, OfferHeader, OfferItem, OfferStatus, OfferTotals, RevisionLink, Sale,
};

use super::query::{OfferFilter, OfferPage, OfferSummary, Pagination};
use super::r#trait::{OfferStore, StoreError, UnitOfWork};

const HEADER_COLUMNS: &str = r#"
    o.id,
    o.offer_number,
    o.owner_id,
    o.client_id,
    o.tax_rate,
    o.status,
    o.is_locked,
    o.locked_at,
    o.total_amount,
    o.total_discount,
    o.total_with_tax,
    o.version,
    o.created_at,
    o.updated_at
"#;

/// Postgres-backed offer store.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct PgOfferStore {
    pool: Arc<PgPool>,
}

impl PgOfferStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl OfferStore for PgOfferStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        tracing::debug!("postgres transaction started");
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    /// Header and items are read from one snapshot, so a concurrent item
    /// write can never show up in only one of them.
    #[instrument(skip(self), fields(offer_id = %id, found = tracing::field::Empty), err)]
    async fn get_offer(&self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("get_offer_snapshot", e))?;

        let offer = read_offer(&mut tx, id, "").await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("get_offer_commit", e))?;

        Span::current().record("found", offer.is_some());
        Ok(offer)
    }

    #[instrument(skip(self), fields(total = tracing::field::Empty), err)]
    async fn list_offers(
        &self,
        filter: &OfferFilter,
        pagination: Pagination,
    ) -> Result<OfferPage, StoreError> {
        let status_param: Option<&str> = filter.status.as_ref().map(OfferStatus::as_str);
        let client_param: Option<uuid::Uuid> = filter.client_id.map(|id| *id.as_uuid());
        let owner_param: Option<uuid::Uuid> = filter.owner_id.map(|id| *id.as_uuid());

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM offers o
            WHERE ($1::text IS NULL OR o.status = $1)
                AND ($2::uuid IS NULL OR o.client_id = $2)
                AND ($3::uuid IS NULL OR o.owner_id = $3)
            "#,
        )
        .bind(status_param)
        .bind(client_param)
        .bind(owner_param)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_offers", e))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StoreError::Corrupt(format!("failed to read total: {e}")))?;

        let sql = format!(
            r#"
            SELECT {HEADER_COLUMNS},
                (SELECT COUNT(*) FROM offer_items i WHERE i.offer_id = o.id) AS item_count
            FROM offers o
            WHERE ($1::text IS NULL OR o.status = $1)
                AND ($2::uuid IS NULL OR o.client_id = $2)
                AND ($3::uuid IS NULL OR o.owner_id = $3)
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $4 OFFSET $5
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(status_param)
            .bind(client_param)
            .bind(owner_param)
            .bind(i64::try_from(pagination.limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(pagination.offset).unwrap_or(i64::MAX))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_offers", e))?;

        let mut offers = Vec::with_capacity(rows.len());
        for row in &rows {
            let item_count: i64 = row
                .try_get("item_count")
                .map_err(|e| StoreError::Corrupt(format!("failed to read item_count: {e}")))?;
            offers.push(OfferSummary {
                header: decode_header(row)?,
                item_count: item_count as u64,
            });
        }

        Span::current().record("total", total);
        Ok(OfferPage::new(offers, total as u64, pagination))
    }

    #[instrument(skip(self), fields(original_offer_id = %original), err)]
    async fn revisions_of(&self, original: OfferId) -> Result<Vec<RevisionLink>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, original_offer_id, revision_offer_id, revision_number, created_at
            FROM offer_revisions
            WHERE original_offer_id = $1
            ORDER BY revision_number ASC
            "#,
        )
        .bind(original.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("revisions_of", e))?;

        rows.iter()
            .map(|row| {
                RevisionRow::from_row(row)
                    .map(RevisionLink::from)
                    .map_err(|e| StoreError::Corrupt(format!("failed to decode revision row: {e}")))
            })
            .collect()
    }

    #[instrument(skip(self), fields(offer_id = %offer_id), err)]
    async fn sale_for_offer(&self, offer_id: OfferId) -> Result<Option<Sale>, StoreError> {
        let row = sqlx::query(SALE_BY_OFFER)
            .bind(offer_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("sale_for_offer", e))?;
        row.as_ref().map(decode_sale).transpose()
    }
}

/// Header plus items on one connection. `suffix` is appended to the header
/// query (`FOR UPDATE` when locking).
async fn read_offer(
    conn: &mut PgConnection,
    id: OfferId,
    suffix: &str,
) -> Result<Option<Offer>, StoreError> {
    let sql = format!("SELECT {HEADER_COLUMNS} FROM offers o WHERE o.id = $1 {suffix}");
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("read_offer", e))?;

    let Some(row) = row else {
        return Ok(None);
    };
    let header = decode_header(&row)?;

    let rows = sqlx::query(ITEMS_BY_OFFER)
        .bind(id.as_uuid())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("read_offer_items", e))?;

    Ok(Some(Offer::from_storage(header, decode_items(&rows)?)))
}

const ITEMS_BY_OFFER: &str = r#"
    SELECT id, offer_id, line_no, product_id, quantity, unit_price, discount_percent, line_total
    FROM offer_items
    WHERE offer_id = $1
    ORDER BY line_no ASC
"#;

const SALE_BY_OFFER: &str = r#"
    SELECT id, offer_id, sale_date, total_amount, notes, created_at
    FROM sales
    WHERE offer_id = $1
"#;

/// One open Postgres transaction. Dropping it rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl UnitOfWork for PgUnitOfWork {
    #[instrument(skip(self), fields(offer_id = %id), err)]
    async fn lock_offer(&mut self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        read_offer(&mut self.tx, id, "FOR UPDATE").await
    }

    #[instrument(skip(self), fields(owner_id = %owner), err)]
    async fn next_offer_number(&mut self, owner: UserId) -> Result<u64, StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('offer_number:' || $1::text, 0))")
            .bind(owner.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_offer_numbering", e))?;

        let row = sqlx::query(
            "SELECT COALESCE(MAX(offer_number), 0) AS current FROM offers WHERE owner_id = $1",
        )
        .bind(owner.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("next_offer_number", e))?;

        let current: i64 = row
            .try_get("current")
            .map_err(|e| StoreError::Corrupt(format!("failed to read current offer number: {e}")))?;
        Ok(current as u64 + 1)
    }

    #[instrument(skip(self, offer), fields(offer_id = %offer.id_typed(), item_count = offer.items().len()), err)]
    async fn insert_offer(&mut self, offer: &Offer) -> Result<(), StoreError> {
        let header = offer.header();
        sqlx::query(
            r#"
            INSERT INTO offers (
                id,
                offer_number,
                owner_id,
                client_id,
                tax_rate,
                status,
                is_locked,
                locked_at,
                total_amount,
                total_discount,
                total_with_tax,
                version,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 1, $12, $13)
            "#,
        )
        .bind(header.id.as_uuid())
        .bind(header.offer_number as i64)
        .bind(header.owner_id.as_uuid())
        .bind(header.client_id.as_uuid())
        .bind(header.tax_rate)
        .bind(header.status.as_str())
        .bind(header.is_locked)
        .bind(header.locked_at)
        .bind(header.totals.total_amount)
        .bind(header.totals.total_discount)
        .bind(header.totals.total_with_tax)
        .bind(header.created_at)
        .bind(header.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_offer", e))?;

        for item in offer.items() {
            self.insert_item(item).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, header), fields(offer_id = %header.id, expected = ?expected), err)]
    async fn save_header(
        &mut self,
        header: &OfferHeader,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let expected_param: Option<i64> = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(v as i64),
        };

        // `is_locked OR $5` keeps the lock flag one-way at the row level.
        let row = sqlx::query(
            r#"
            UPDATE offers SET
                status = $2,
                tax_rate = $3,
                locked_at = COALESCE(locked_at, $4),
                is_locked = is_locked OR $5,
                total_amount = $6,
                total_discount = $7,
                total_with_tax = $8,
                updated_at = $9,
                version = version + 1
            WHERE id = $1 AND ($10::bigint IS NULL OR version = $10)
            RETURNING version
            "#,
        )
        .bind(header.id.as_uuid())
        .bind(header.status.as_str())
        .bind(header.tax_rate)
        .bind(header.locked_at)
        .bind(header.is_locked)
        .bind(header.totals.total_amount)
        .bind(header.totals.total_discount)
        .bind(header.totals.total_with_tax)
        .bind(header.updated_at)
        .bind(expected_param)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_header", e))?;

        match row {
            Some(row) => {
                let version: i64 = row
                    .try_get("version")
                    .map_err(|e| StoreError::Corrupt(format!("failed to read version: {e}")))?;
                Ok(version as u64)
            }
            None => Err(StoreError::Conflict(format!(
                "offer {}: expected {expected:?}, row missing or at another version",
                header.id
            ))),
        }
    }

    #[instrument(skip(self, item), fields(offer_id = %item.offer_id, item_id = %item.id), err)]
    async fn insert_item(&mut self, item: &OfferItem) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO offer_items (
                id,
                offer_id,
                line_no,
                product_id,
                quantity,
                unit_price,
                discount_percent,
                line_total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.offer_id.as_uuid())
        .bind(item.line_no as i32)
        .bind(item.product_id.as_uuid())
        .bind(item.pricing.quantity())
        .bind(item.pricing.unit_price())
        .bind(item.pricing.discount_percent())
        .bind(item.line_total)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(offer_id = %item.offer_id, item_id = %item.id), err)]
    async fn update_item(&mut self, item: &OfferItem) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE offer_items SET
                quantity = $3,
                unit_price = $4,
                discount_percent = $5,
                line_total = $6
            WHERE id = $1 AND offer_id = $2
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.offer_id.as_uuid())
        .bind(item.pricing.quantity())
        .bind(item.pricing.unit_price())
        .bind(item.pricing.discount_percent())
        .bind(item.line_total)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(format!("offer item {}", item.id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(offer_id = %offer_id, item_id = %item_id), err)]
    async fn delete_item(&mut self, offer_id: OfferId, item_id: OfferItemId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM offer_items WHERE id = $1 AND offer_id = $2")
            .bind(item_id.as_uuid())
            .bind(offer_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(format!("offer item {item_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(original_offer_id = %original), err)]
    async fn max_revision_number(&mut self, original: OfferId) -> Result<Option<u32>, StoreError> {
        let row = sqlx::query(
            "SELECT MAX(revision_number) AS current FROM offer_revisions WHERE original_offer_id = $1",
        )
        .bind(original.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("max_revision_number", e))?;

        let current: Option<i32> = row
            .try_get("current")
            .map_err(|e| StoreError::Corrupt(format!("failed to read revision number: {e}")))?;
        Ok(current.map(|n| n as u32))
    }

    #[instrument(
        skip(self, link),
        fields(
            original_offer_id = %link.original_offer_id,
            revision_offer_id = %link.revision_offer_id,
            revision_number = link.revision_number
        ),
        err
    )]
    async fn insert_revision(&mut self, link: &RevisionLink) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO offer_revisions (
                id,
                original_offer_id,
                revision_offer_id,
                revision_number,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(link.id.as_uuid())
        .bind(link.original_offer_id.as_uuid())
        .bind(link.revision_offer_id.as_uuid())
        .bind(link.revision_number as i32)
        .bind(link.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_revision", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(offer_id = %offer_id), err)]
    async fn sale_for_offer(&mut self, offer_id: OfferId) -> Result<Option<Sale>, StoreError> {
        let row = sqlx::query(SALE_BY_OFFER)
            .bind(offer_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("sale_for_offer", e))?;
        row.as_ref().map(decode_sale).transpose()
    }

    #[instrument(skip(self, sale), fields(offer_id = %sale.offer_id, sale_id = %sale.id), err)]
    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sales (id, offer_id, sale_date, total_amount, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(sale.id.as_uuid())
        .bind(sale.offer_id.as_uuid())
        .bind(sale.sale_date)
        .bind(sale.total_amount)
        .bind(sale.notes.as_deref())
        .bind(sale.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_sale", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        tracing::debug!("postgres transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))?;
        tracing::debug!("postgres transaction rolled back");
        Ok(())
    }
}

/// Map SQLx errors to StoreError.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") | Some("55P03") => StoreError::Transient(msg),
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Transient(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Transient(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Transient(format!("io error in {operation}: {e}")),
        sqlx::Error::RowNotFound => {
            StoreError::Missing(format!("unexpected row not found in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

fn decode_header(row: &PgRow) -> Result<OfferHeader, StoreError> {
    let raw = OfferRow::from_row(row)
        .map_err(|e| StoreError::Corrupt(format!("failed to decode offer row: {e}")))?;
    raw.try_into()
}

fn decode_items(rows: &[PgRow]) -> Result<Vec<OfferItem>, StoreError> {
    rows.iter()
        .map(|row| {
            OfferItemRow::from_row(row)
                .map_err(|e| StoreError::Corrupt(format!("failed to decode offer item row: {e}")))
                .and_then(OfferItem::try_from)
        })
        .collect()
}

fn decode_sale(row: &PgRow) -> Result<Sale, StoreError> {
    SaleRow::from_row(row)
        .map(Sale::from)
        .map_err(|e| StoreError::Corrupt(format!("failed to decode sale row: {e}")))
}

// SQLx row types

#[derive(Debug)]
struct OfferRow {
    id: uuid::Uuid,
    offer_number: i64,
    owner_id: uuid::Uuid,
    client_id: uuid::Uuid,
    tax_rate: Decimal,
    status: String,
    is_locked: bool,
    locked_at: Option<DateTime<Utc>>,
    total_amount: Decimal,
    total_discount: Decimal,
    total_with_tax: Decimal,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for OfferRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OfferRow {
            id: row.try_get("id")?,
            offer_number: row.try_get("offer_number")?,
            owner_id: row.try_get("owner_id")?,
            client_id: row.try_get("client_id")?,
            tax_rate: row.try_get("tax_rate")?,
            status: row.try_get("status")?,
            is_locked: row.try_get("is_locked")?,
            locked_at: row.try_get("locked_at")?,
            total_amount: row.try_get("total_amount")?,
            total_discount: row.try_get("total_discount")?,
            total_with_tax: row.try_get("total_with_tax")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<OfferRow> for OfferHeader {
    type Error = StoreError;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        let status: OfferStatus = row
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("offer {}: {e}", row.id)))?;

        Ok(OfferHeader {
            id: OfferId::from_uuid(row.id),
            offer_number: row.offer_number as u64,
            owner_id: UserId::from_uuid(row.owner_id),
            client_id: ClientId::from_uuid(row.client_id),
            tax_rate: row.tax_rate,
            status,
            is_locked: row.is_locked,
            locked_at: row.locked_at,
            totals: OfferTotals {
                total_amount: row.total_amount,
                total_discount: row.total_discount,
                total_with_tax: row.total_with_tax,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version as u64,
        })
    }
}

#[derive(Debug)]
struct OfferItemRow {
    id: uuid::Uuid,
    offer_id: uuid::Uuid,
    line_no: i32,
    product_id: uuid::Uuid,
    quantity: Decimal,
    unit_price: Decimal,
    discount_percent: Decimal,
    line_total: Decimal,
}

impl<'r> FromRow<'r, PgRow> for OfferItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OfferItemRow {
            id: row.try_get("id")?,
            offer_id: row.try_get("offer_id")?,
            line_no: row.try_get("line_no")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            discount_percent: row.try_get("discount_percent")?,
            line_total: row.try_get("line_total")?,
        })
    }
}

impl TryFrom<OfferItemRow> for OfferItem {
    type Error = StoreError;

    fn try_from(row: OfferItemRow) -> Result<Self, Self::Error> {
        let pricing = LinePricing::new(row.quantity, row.unit_price, row.discount_percent)
            .map_err(|e| StoreError::Corrupt(format!("offer item {}: {e}", row.id)))?;

        Ok(OfferItem {
            id: OfferItemId::from_uuid(row.id),
            offer_id: OfferId::from_uuid(row.offer_id),
            line_no: row.line_no as u32,
            product_id: ProductId::from_uuid(row.product_id),
            pricing,
            line_total: row.line_total,
        })
    }
}

#[derive(Debug)]
struct RevisionRow {
    id: uuid::Uuid,
    original_offer_id: uuid::Uuid,
    revision_offer_id: uuid::Uuid,
    revision_number: i32,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for RevisionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(RevisionRow {
            id: row.try_get("id")?,
            original_offer_id: row.try_get("original_offer_id")?,
            revision_offer_id: row.try_get("revision_offer_id")?,
            revision_number: row.try_get("revision_number")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<RevisionRow> for RevisionLink {
    fn from(row: RevisionRow) -> Self {
        RevisionLink {
            id: RevisionId::from_uuid(row.id),
            original_offer_id: OfferId::from_uuid(row.original_offer_id),
            revision_offer_id: OfferId::from_uuid(row.revision_offer_id),
            revision_number: row.revision_number as u32,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug)]
struct SaleRow {
    id: uuid::Uuid,
    offer_id: uuid::Uuid,
    sale_date: NaiveDate,
    total_amount: Decimal,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for SaleRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(SaleRow {
            id: row.try_get("id")?,
            offer_id: row.try_get("offer_id")?,
            sale_date: row.try_get("sale_date")?,
            total_amount: row.try_get("total_amount")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<SaleRow> for Sale {
    fn from(row: SaleRow) -> Self {
        Sale {
            id: SaleId::from_uuid(row.id),
            offer_id: OfferId::from_uuid(row.offer_id),
            sale_date: row.sale_date,
            total_amount: row.total_amount,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_transient() {
        assert!(matches!(
            map_sqlx_error("op", sqlx::Error::PoolTimedOut),
            StoreError::Transient(_)
        ));
        assert!(map_sqlx_error("op", sqlx::Error::PoolClosed).is_retryable());
    }

    #[test]
    fn unknown_errors_are_not_retryable() {
        let err = map_sqlx_error("op", sqlx::Error::Protocol("bad frame".into()));
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn corrupt_status_is_reported() {
        let row = OfferRow {
            id: uuid::Uuid::nil(),
            offer_number: 1,
            owner_id: uuid::Uuid::nil(),
            client_id: uuid::Uuid::nil(),
            tax_rate: Decimal::from(20),
            status: "archived".into(),
            is_locked: false,
            locked_at: None,
            total_amount: Decimal::ZERO,
            total_discount: Decimal::ZERO,
            total_with_tax: Decimal::ZERO,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(OfferHeader::try_from(row), Err(StoreError::Corrupt(_))));
    }
}
