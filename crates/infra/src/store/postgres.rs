//! Postgres-backed sales store.
//!
//! Every service transaction maps to one database transaction. Row locks come
//! from `SELECT … FOR UPDATE`, bounded by a per-transaction `lock_timeout`.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` by SQLSTATE:
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |----------------------|------------|----------|
//! | `23505` unique_violation | `UniqueViolation` | Duplicate document number, second order for one quote |
//! | `55P03` lock_not_available | `LockTimeout` | `lock_timeout` elapsed waiting for a row lock |
//! | `40001` serialization_failure | `LockTimeout` | Serialization conflict |
//! | `40P01` deadlock_detected | `LockTimeout` | Deadlock broken by the server |
//! | Any other / non-database | `Backend` | Connectivity, constraint bugs, corrupt rows |

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use salesflow_core::{ClientId, MovementId, OrderId, ProductId, QuoteId, UserId};
use salesflow_inventory::{MovementDirection, Product, StockMovement};
use salesflow_sales::{
    Adjustments, DocumentNumber, DocumentType, LineItem, Order, OrderStatus, Quote, QuoteStatus,
    Totals,
};

use super::{SalesStore, StoreError, StoreTx};
use crate::config::DatabaseConfig;

const SCHEMA: &str = include_str!("../../migrations/0001_sales_core.sql");

/// Advisory lock key serialising concurrent schema application.
const SCHEMA_LOCK_KEY: i64 = 0x5341_4C45_5346_4C57;

/// Postgres-backed sales store.
#[derive(Debug, Clone)]
pub struct PostgresSalesStore {
    pool: Arc<PgPool>,
    lock_timeout: Duration,
}

impl PostgresSalesStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            lock_timeout,
        }
    }

    /// Open a pool from configuration and make sure the schema exists.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| anyhow::anyhow!("connecting to sales database: {e}"))?;

        let store = Self::new(pool, Duration::from_millis(config.lock_timeout_ms));
        store
            .apply_schema()
            .await
            .map_err(|e| anyhow::anyhow!("applying sales schema: {e}"))?;
        Ok(store)
    }

    /// Apply the bundled schema. Idempotent, and safe to call from several
    /// processes at once.
    #[instrument(skip(self), err)]
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("schema_lock", e))?;
        sqlx::raw_sql(SCHEMA)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        info!("sales schema applied");
        Ok(())
    }

    /// Read-only transaction over one snapshot, so a header and its items
    /// always come from the same committed state.
    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_snapshot", e))?;
        Ok(tx)
    }

    /// Create or replace a product row. Stock changes after this go through
    /// the ledger.
    pub async fn upsert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, stock, min_stock, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                stock = EXCLUDED.stock,
                min_stock = EXCLUDED.min_stock,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.stock)
        .bind(product.min_stock)
        .bind(product.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_product", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SalesStore for PostgresSalesStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // SET LOCAL does not take bind parameters; set_config(.., true) is the
        // transaction-scoped equivalent.
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(PRODUCT_SELECT)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_product", e))?;
        row.map(|r| decode::<ProductRow>(&r).map(Product::from))
            .transpose()
    }

    async fn find_quote(&self, id: QuoteId) -> Result<Option<Quote>, StoreError> {
        let mut tx = self.begin_snapshot().await?;
        let quote = load_quote(&mut tx, id, false).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(quote)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let mut tx = self.begin_snapshot().await?;
        let order = load_order(&mut tx, id, false).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(order)
    }

    async fn list_movements(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, direction, quantity, stock_before, stock_after,
                   order_id, user_id, reason, created_at
            FROM stock_movements
            WHERE product_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        rows.iter()
            .map(|row| StockMovement::try_from(decode::<MovementRow>(row)?))
            .collect()
    }
}

struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl StoreTx for PgStoreTx {
    async fn next_document_sequence(
        &mut self,
        document_type: DocumentType,
        year: i32,
    ) -> Result<u32, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO document_counters (document_type, year, last_value)
            VALUES ($1, $2, 1)
            ON CONFLICT (document_type, year)
            DO UPDATE SET last_value = document_counters.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(document_type.prefix())
        .bind(year)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("next_document_sequence", e))?;

        let value: i64 = row
            .try_get("last_value")
            .map_err(|e| StoreError::Backend(format!("failed to read last_value: {e}")))?;
        u32::try_from(value)
            .map_err(|_| StoreError::Backend(format!("document counter out of range: {value}")))
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("{PRODUCT_SELECT} FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_product", e))?;
        row.map(|r| decode::<ProductRow>(&r).map(Product::from))
            .transpose()
    }

    async fn update_product_stock(&mut self, product: &Product) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE products SET stock = $2, updated_at = $3 WHERE id = $1")
            .bind(product.id.as_uuid())
            .bind(product.stock)
            .bind(product.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_product_stock", e))?;
        expect_one_row("update_product_stock", result.rows_affected())
    }

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, direction, quantity, stock_before, stock_after,
                order_id, user_id, reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.direction.as_str())
        .bind(movement.quantity)
        .bind(movement.stock_before)
        .bind(movement.stock_after)
        .bind(movement.order_id.map(|id| *id.as_uuid()))
        .bind(movement.user_id.as_uuid())
        .bind(&movement.reason)
        .bind(movement.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_movement", e))?;
        Ok(())
    }

    async fn lock_quote(&mut self, id: QuoteId) -> Result<Option<Quote>, StoreError> {
        load_quote(&mut self.tx, id, true).await
    }

    async fn insert_quote(&mut self, quote: &Quote) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO quotes (
                id, number, client_id, status, converted, order_id,
                discount_value, discount_percent, surcharge, freight,
                subtotal, applied_discount, total,
                valid_until, notes, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(quote.id.as_uuid())
        .bind(quote.number.to_string())
        .bind(quote.client_id.as_uuid())
        .bind(quote.status.as_str())
        .bind(quote.converted)
        .bind(quote.order_id.map(|id| *id.as_uuid()))
        .bind(quote.adjustments.discount_value)
        .bind(quote.adjustments.discount_percent)
        .bind(quote.adjustments.surcharge)
        .bind(quote.adjustments.freight)
        .bind(quote.totals.subtotal)
        .bind(quote.totals.discount_value)
        .bind(quote.totals.total)
        .bind(quote.valid_until)
        .bind(&quote.notes)
        .bind(quote.created_by.as_uuid())
        .bind(quote.created_at)
        .bind(quote.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_quote", e))?;

        insert_items(&mut self.tx, ItemTable::Quote, *quote.id.as_uuid(), &quote.items).await
    }

    async fn update_quote(&mut self, quote: &Quote) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE quotes SET
                client_id = $2, status = $3, converted = $4, order_id = $5,
                discount_value = $6, discount_percent = $7, surcharge = $8, freight = $9,
                subtotal = $10, applied_discount = $11, total = $12,
                valid_until = $13, notes = $14, updated_at = $15
            WHERE id = $1
            "#,
        )
        .bind(quote.id.as_uuid())
        .bind(quote.client_id.as_uuid())
        .bind(quote.status.as_str())
        .bind(quote.converted)
        .bind(quote.order_id.map(|id| *id.as_uuid()))
        .bind(quote.adjustments.discount_value)
        .bind(quote.adjustments.discount_percent)
        .bind(quote.adjustments.surcharge)
        .bind(quote.adjustments.freight)
        .bind(quote.totals.subtotal)
        .bind(quote.totals.discount_value)
        .bind(quote.totals.total)
        .bind(quote.valid_until)
        .bind(&quote.notes)
        .bind(quote.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_quote", e))?;
        expect_one_row("update_quote", result.rows_affected())?;

        sqlx::query("DELETE FROM quote_items WHERE quote_id = $1")
            .bind(quote.id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("replace_quote_items", e))?;
        insert_items(&mut self.tx, ItemTable::Quote, *quote.id.as_uuid(), &quote.items).await
    }

    async fn delete_quote(&mut self, id: QuoteId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM quotes WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_quote", e))?;
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        load_order(&mut self.tx, id, true).await
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, number, client_id, quote_id, status,
                discount_value, discount_percent, surcharge, freight,
                subtotal, applied_discount, total,
                notes, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.number.to_string())
        .bind(order.client_id.as_uuid())
        .bind(order.quote_id.map(|id| *id.as_uuid()))
        .bind(order.status.as_str())
        .bind(order.adjustments.discount_value)
        .bind(order.adjustments.discount_percent)
        .bind(order.adjustments.surcharge)
        .bind(order.adjustments.freight)
        .bind(order.totals.subtotal)
        .bind(order.totals.discount_value)
        .bind(order.totals.total)
        .bind(&order.notes)
        .bind(order.created_by.as_uuid())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        insert_items(&mut self.tx, ItemTable::Order, *order.id.as_uuid(), &order.items).await
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = $2, notes = $3, cancel_reason = $4,
                approved_by = $5, cancelled_by = $6,
                approved_at = $7, in_production_at = $8, picking_at = $9,
                invoiced_at = $10, in_transit_at = $11, delivered_at = $12,
                cancelled_at = $13, updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(&order.notes)
        .bind(&order.cancel_reason)
        .bind(order.approved_by.map(|id| *id.as_uuid()))
        .bind(order.cancelled_by.map(|id| *id.as_uuid()))
        .bind(order.approved_at)
        .bind(order.in_production_at)
        .bind(order.picking_at)
        .bind(order.invoiced_at)
        .bind(order.in_transit_at)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;
        expect_one_row("update_order", result.rows_affected())
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

const PRODUCT_SELECT: &str =
    "SELECT id, name, stock, min_stock, updated_at FROM products WHERE id = $1";

#[derive(Clone, Copy)]
enum ItemTable {
    Quote,
    Order,
}

impl ItemTable {
    fn insert_sql(self) -> &'static str {
        match self {
            ItemTable::Quote => {
                "INSERT INTO quote_items (quote_id, position, product_id, quantity, unit_price, discount, subtotal) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)"
            }
            ItemTable::Order => {
                "INSERT INTO order_items (order_id, position, product_id, quantity, unit_price, discount, subtotal) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)"
            }
        }
    }

    fn select_sql(self) -> &'static str {
        match self {
            ItemTable::Quote => {
                "SELECT position, product_id, quantity, unit_price, discount, subtotal \
                 FROM quote_items WHERE quote_id = $1 ORDER BY position"
            }
            ItemTable::Order => {
                "SELECT position, product_id, quantity, unit_price, discount, subtotal \
                 FROM order_items WHERE order_id = $1 ORDER BY position"
            }
        }
    }
}

async fn insert_items(
    conn: &mut sqlx::PgConnection,
    table: ItemTable,
    owner: Uuid,
    items: &[LineItem],
) -> Result<(), StoreError> {
    for item in items {
        let position = i32::try_from(item.position)
            .map_err(|_| StoreError::Backend(format!("item position out of range: {}", item.position)))?;
        sqlx::query(table.insert_sql())
            .bind(owner)
            .bind(position)
            .bind(item.product_id.as_uuid())
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.discount)
            .bind(item.subtotal)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("insert_items", e))?;
    }
    Ok(())
}

async fn load_items(
    conn: &mut sqlx::PgConnection,
    table: ItemTable,
    owner: Uuid,
) -> Result<Vec<LineItem>, StoreError> {
    let rows = sqlx::query(table.select_sql())
        .bind(owner)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;
    rows.iter()
        .map(|row| LineItem::try_from(decode::<ItemRow>(row)?))
        .collect()
}

async fn load_quote(
    conn: &mut sqlx::PgConnection,
    id: QuoteId,
    lock: bool,
) -> Result<Option<Quote>, StoreError> {
    let sql = format!(
        r#"
        SELECT id, number, client_id, status, converted, order_id,
               discount_value, discount_percent, surcharge, freight,
               subtotal, applied_discount, total,
               valid_until, notes, created_by, created_at, updated_at
        FROM quotes
        WHERE id = $1
        {}
        "#,
        if lock { "FOR UPDATE" } else { "" }
    );
    let Some(row) = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_quote", e))?
    else {
        return Ok(None);
    };

    let header = decode::<QuoteRow>(&row)?;
    let items = load_items(conn, ItemTable::Quote, header.id).await?;
    header.into_quote(items).map(Some)
}

async fn load_order(
    conn: &mut sqlx::PgConnection,
    id: OrderId,
    lock: bool,
) -> Result<Option<Order>, StoreError> {
    let sql = format!(
        r#"
        SELECT id, number, client_id, quote_id, status,
               discount_value, discount_percent, surcharge, freight,
               subtotal, applied_discount, total,
               notes, cancel_reason, created_by, approved_by, cancelled_by,
               created_at, approved_at, in_production_at, picking_at,
               invoiced_at, in_transit_at, delivered_at, cancelled_at, updated_at
        FROM orders
        WHERE id = $1
        {}
        "#,
        if lock { "FOR UPDATE" } else { "" }
    );
    let Some(row) = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_order", e))?
    else {
        return Ok(None);
    };

    let header = decode::<OrderRow>(&row)?;
    let items = load_items(conn, ItemTable::Order, header.id).await?;
    header.into_order(items).map(Some)
}

fn expect_one_row(operation: &str, affected: u64) -> Result<(), StoreError> {
    if affected != 1 {
        return Err(StoreError::Backend(format!(
            "{operation}: expected 1 row, {affected} affected"
        )));
    }
    Ok(())
}

fn decode<T>(row: &PgRow) -> Result<T, StoreError>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    T::from_row(row).map_err(|e| StoreError::Backend(format!("failed to decode row: {e}")))
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("corrupt {what}: {err}"))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(
                    db_err
                        .constraint()
                        .map(|c| format!("{operation}: {c}"))
                        .unwrap_or(msg),
                ),
                Some("55P03") | Some("40001") | Some("40P01") => StoreError::LockTimeout(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::LockTimeout(format!("no pooled connection available in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: Uuid,
    name: String,
    stock: i64,
    min_stock: i64,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            stock: row.try_get("stock")?,
            min_stock: row.try_get("min_stock")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            stock: row.stock,
            min_stock: row.min_stock,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
struct ItemRow {
    position: i32,
    product_id: Uuid,
    quantity: i64,
    unit_price: Decimal,
    discount: Decimal,
    subtotal: Decimal,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            position: row.try_get("position")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            discount: row.try_get("discount")?,
            subtotal: row.try_get("subtotal")?,
        })
    }
}

impl TryFrom<ItemRow> for LineItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(LineItem {
            position: u32::try_from(row.position).map_err(|e| corrupt("item position", e))?,
            product_id: ProductId::from_uuid(row.product_id),
            quantity: row.quantity,
            unit_price: row.unit_price,
            discount: row.discount,
            subtotal: row.subtotal,
        })
    }
}

/// Monetary columns shared by quotes and orders.
#[derive(Debug)]
struct MoneyColumns {
    discount_value: Decimal,
    discount_percent: Decimal,
    surcharge: Decimal,
    freight: Decimal,
    subtotal: Decimal,
    applied_discount: Decimal,
    total: Decimal,
}

impl MoneyColumns {
    fn read(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(MoneyColumns {
            discount_value: row.try_get("discount_value")?,
            discount_percent: row.try_get("discount_percent")?,
            surcharge: row.try_get("surcharge")?,
            freight: row.try_get("freight")?,
            subtotal: row.try_get("subtotal")?,
            applied_discount: row.try_get("applied_discount")?,
            total: row.try_get("total")?,
        })
    }

    fn split(self) -> (Adjustments, Totals) {
        (
            Adjustments {
                discount_value: self.discount_value,
                discount_percent: self.discount_percent,
                surcharge: self.surcharge,
                freight: self.freight,
            },
            Totals {
                subtotal: self.subtotal,
                discount_value: self.applied_discount,
                total: self.total,
            },
        )
    }
}

#[derive(Debug)]
struct QuoteRow {
    id: Uuid,
    number: String,
    client_id: Uuid,
    status: String,
    converted: bool,
    order_id: Option<Uuid>,
    money: MoneyColumns,
    valid_until: Option<NaiveDate>,
    notes: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for QuoteRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(QuoteRow {
            id: row.try_get("id")?,
            number: row.try_get("number")?,
            client_id: row.try_get("client_id")?,
            status: row.try_get("status")?,
            converted: row.try_get("converted")?,
            order_id: row.try_get("order_id")?,
            money: MoneyColumns::read(row)?,
            valid_until: row.try_get("valid_until")?,
            notes: row.try_get("notes")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl QuoteRow {
    fn into_quote(self, items: Vec<LineItem>) -> Result<Quote, StoreError> {
        let number: DocumentNumber = self.number.parse().map_err(|e| corrupt("quote number", e))?;
        let status: QuoteStatus = self.status.parse().map_err(|e| corrupt("quote status", e))?;
        let (adjustments, totals) = self.money.split();
        Ok(Quote {
            id: QuoteId::from_uuid(self.id),
            number,
            client_id: ClientId::from_uuid(self.client_id),
            items,
            adjustments,
            totals,
            status,
            converted: self.converted,
            order_id: self.order_id.map(OrderId::from_uuid),
            valid_until: self.valid_until,
            notes: self.notes,
            created_by: UserId::from_uuid(self.created_by),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug)]
struct OrderRow {
    id: Uuid,
    number: String,
    client_id: Uuid,
    quote_id: Option<Uuid>,
    status: String,
    money: MoneyColumns,
    notes: Option<String>,
    cancel_reason: Option<String>,
    created_by: Uuid,
    approved_by: Option<Uuid>,
    cancelled_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
    in_production_at: Option<DateTime<Utc>>,
    picking_at: Option<DateTime<Utc>>,
    invoiced_at: Option<DateTime<Utc>>,
    in_transit_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            number: row.try_get("number")?,
            client_id: row.try_get("client_id")?,
            quote_id: row.try_get("quote_id")?,
            status: row.try_get("status")?,
            money: MoneyColumns::read(row)?,
            notes: row.try_get("notes")?,
            cancel_reason: row.try_get("cancel_reason")?,
            created_by: row.try_get("created_by")?,
            approved_by: row.try_get("approved_by")?,
            cancelled_by: row.try_get("cancelled_by")?,
            created_at: row.try_get("created_at")?,
            approved_at: row.try_get("approved_at")?,
            in_production_at: row.try_get("in_production_at")?,
            picking_at: row.try_get("picking_at")?,
            invoiced_at: row.try_get("invoiced_at")?,
            in_transit_at: row.try_get("in_transit_at")?,
            delivered_at: row.try_get("delivered_at")?,
            cancelled_at: row.try_get("cancelled_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> Result<Order, StoreError> {
        let number: DocumentNumber = self.number.parse().map_err(|e| corrupt("order number", e))?;
        let status: OrderStatus = self.status.parse().map_err(|e| corrupt("order status", e))?;
        let (adjustments, totals) = self.money.split();
        Ok(Order {
            id: OrderId::from_uuid(self.id),
            number,
            client_id: ClientId::from_uuid(self.client_id),
            quote_id: self.quote_id.map(QuoteId::from_uuid),
            items,
            adjustments,
            totals,
            status,
            notes: self.notes,
            cancel_reason: self.cancel_reason,
            created_by: UserId::from_uuid(self.created_by),
            approved_by: self.approved_by.map(UserId::from_uuid),
            cancelled_by: self.cancelled_by.map(UserId::from_uuid),
            created_at: self.created_at,
            approved_at: self.approved_at,
            in_production_at: self.in_production_at,
            picking_at: self.picking_at,
            invoiced_at: self.invoiced_at,
            in_transit_at: self.in_transit_at,
            delivered_at: self.delivered_at,
            cancelled_at: self.cancelled_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug)]
struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    direction: String,
    quantity: i64,
    stock_before: i64,
    stock_after: i64,
    order_id: Option<Uuid>,
    user_id: Uuid,
    reason: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            direction: row.try_get("direction")?,
            quantity: row.try_get("quantity")?,
            stock_before: row.try_get("stock_before")?,
            stock_after: row.try_get("stock_after")?,
            order_id: row.try_get("order_id")?,
            user_id: row.try_get("user_id")?,
            reason: row.try_get("reason")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let direction: MovementDirection = row
            .direction
            .parse()
            .map_err(|e| corrupt("movement direction", e))?;
        Ok(StockMovement {
            id: MovementId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            direction,
            quantity: row.quantity,
            stock_before: row.stock_before,
            stock_after: row.stock_after,
            order_id: row.order_id.map(OrderId::from_uuid),
            user_id: UserId::from_uuid(row.user_id),
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}
