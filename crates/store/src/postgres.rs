use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use common::{Money, OrderId, ProductId, UserId};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::records::{OrderLine, OrderRecord, OrderStatus, ProductRow};
use crate::storefront::{InventoryOps, LedgerOps, Storefront};

// SQLSTATE codes Postgres reports when a bounded lock wait gives up.
const LOCK_NOT_AVAILABLE: &str = "55P03";
const DEADLOCK_DETECTED: &str = "40P01";

/// PostgreSQL-backed storefront store.
#[derive(Clone)]
pub struct PostgresStorefront {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PostgresStorefront {
    /// Creates a storefront store over an existing pool with the default
    /// lock timeout.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout_ms: Config::default().lock_timeout_ms,
        }
    }

    /// Connects a new pool according to the given configuration.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            lock_timeout_ms = config.lock_timeout_ms,
            "connected to storefront database"
        );

        Ok(Self {
            pool,
            lock_timeout_ms: config.lock_timeout_ms,
        })
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: &PgRow) -> Result<ProductRow> {
        Ok(ProductRow {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: row.try_get("stock")?,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<OrderRecord> {
        let status: String = row.try_get("status")?;
        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            total: Money::from_cents(row.try_get("total_cents")?),
            payment_method: row.try_get("payment_method")?,
            delivery_address: row.try_get("delivery_address")?,
            status: OrderStatus::from_str(&status)?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLine> {
        let quantity: i32 = row.try_get("quantity")?;
        Ok(OrderLine {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: quantity.max(0) as u32,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            total: Money::from_cents(row.try_get("total_cents")?),
        })
    }
}

/// One open Postgres transaction over the storefront tables.
pub struct PgStorefrontTx {
    tx: Transaction<'static, Postgres>,
}

/// Maps lock-wait aborts onto [`StoreError::LockContended`] for the product
/// whose row was being locked.
fn map_lock_error(product_id: ProductId, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && let Some(code) = db_err.code()
        && (code == LOCK_NOT_AVAILABLE || code == DEADLOCK_DETECTED)
    {
        return StoreError::LockContended(product_id);
    }
    StoreError::Database(err)
}

#[async_trait]
impl InventoryOps for PgStorefrontTx {
    async fn lock_and_read(&mut self, product_id: ProductId) -> Result<Option<ProductRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, category, price_cents, stock
            FROM products
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_lock_error(product_id, e))?;

        row.as_ref().map(PostgresStorefront::row_to_product).transpose()
    }

    async fn decrement_if_positive(&mut self, product_id: ProductId) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - 1, updated_at = NOW()
            WHERE id = $1 AND stock > 0
            "#,
        )
        .bind(product_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_lock_error(product_id, e))?;

        Ok(result.rows_affected())
    }

    async fn increment(&mut self, product_id: ProductId) -> Result<()> {
        sqlx::query("UPDATE products SET stock = stock + 1 WHERE id = $1")
            .bind(product_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_lock_error(product_id, e))?;

        Ok(())
    }
}

#[async_trait]
impl LedgerOps for PgStorefrontTx {
    async fn create_master(
        &mut self,
        user_id: UserId,
        total: Money,
        payment_method: &str,
        delivery_address: &str,
    ) -> Result<OrderId> {
        let order_id = OrderId::new();

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_cents, payment_method, delivery_address, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(total.cents())
        .bind(payment_method)
        .bind(delivery_address)
        .bind(OrderStatus::Pending.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(order_id)
    }

    async fn append_detail(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_details (order_id, product_id, quantity, unit_price_cents, total_cents)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(quantity as i32)
        .bind(unit_price.cents())
        .bind(unit_price.multiply(quantity).cents())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Storefront for PostgresStorefront {
    type Tx = PgStorefrontTx;

    async fn begin(&self) -> Result<Self::Tx> {
        let mut tx = self.pool.begin().await?;

        // Bound the row-lock wait so a stuck checkout surfaces as a
        // retryable error instead of blocking its request forever.
        // SET LOCAL scopes the setting to this transaction.
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout_ms
        ))
        .execute(&mut *tx)
        .await?;

        Ok(PgStorefrontTx { tx })
    }

    async fn commit(&self, tx: Self::Tx) -> Result<()> {
        tx.tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        tx.tx.rollback().await?;
        Ok(())
    }

    async fn list_available(&self) -> Result<Vec<ProductRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, category, price_cents, stock
            FROM products
            WHERE stock > 0
            ORDER BY category, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_product).collect()
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRow>> {
        let row = sqlx::query(
            "SELECT id, name, category, price_cents, stock FROM products WHERE id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, total_cents, payment_method, delivery_address, status, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price_cents, total_cents
            FROM order_details
            WHERE order_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_line).collect()
    }

    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(order_id.as_uuid())
            .execute(&self.pool)
            .await?;

        tracing::info!(%order_id, %status, "order status updated");
        Ok(())
    }
}
