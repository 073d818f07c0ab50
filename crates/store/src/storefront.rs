//! Consumed store interfaces: inventory operations, ledger operations, and
//! the transactional seam that binds them into one atomic scope.

use async_trait::async_trait;
use common::{Money, OrderId, ProductId, UserId};

use crate::error::Result;
use crate::records::{OrderLine, OrderRecord, OrderStatus, ProductRow};

/// Inventory operations available inside an open transaction.
#[async_trait]
pub trait InventoryOps {
    /// Reads a product row under an exclusive row lock.
    ///
    /// Blocks until the lock is granted or the store aborts the wait, in
    /// which case the error is [`StoreError::LockContended`]. Returns
    /// `None` if no such product exists.
    ///
    /// [`StoreError::LockContended`]: crate::StoreError::LockContended
    async fn lock_and_read(&mut self, product_id: ProductId) -> Result<Option<ProductRow>>;

    /// Decrements stock by one, only if stock is strictly positive at that
    /// instant. Returns the number of rows affected (0 or 1).
    async fn decrement_if_positive(&mut self, product_id: ProductId) -> Result<u64>;

    /// Increments stock by one. Compensation only.
    async fn increment(&mut self, product_id: ProductId) -> Result<()>;
}

/// Order ledger operations available inside an open transaction.
///
/// The ledger is append-only from checkout's point of view: masters and
/// detail lines are written exactly once and never updated by this trait.
#[async_trait]
pub trait LedgerOps {
    /// Inserts an order master with status `Pending` and returns its
    /// generated id.
    async fn create_master(
        &mut self,
        user_id: UserId,
        total: Money,
        payment_method: &str,
        delivery_address: &str,
    ) -> Result<OrderId>;

    /// Appends one detail line under an existing master.
    async fn append_detail(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<()>;
}

/// The storefront's relational store: transaction management plus the
/// non-transactional reads used by browsing and the staff flows.
///
/// `begin` opens one atomic scope; everything done through the returned
/// transaction becomes durable on `commit` and leaves no residue on
/// `rollback`. Implementations: [`PostgresStorefront`] for production,
/// [`MemoryStorefront`] for tests.
///
/// [`PostgresStorefront`]: crate::PostgresStorefront
/// [`MemoryStorefront`]: crate::MemoryStorefront
#[async_trait]
pub trait Storefront: Send + Sync {
    /// Handle to one open transaction.
    type Tx: InventoryOps + LedgerOps + Send;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Makes the transaction's writes durable.
    async fn commit(&self, tx: Self::Tx) -> Result<()>;

    /// Discards everything the transaction did.
    async fn rollback(&self, tx: Self::Tx) -> Result<()>;

    /// Lists in-stock products ordered by category then name.
    async fn list_available(&self) -> Result<Vec<ProductRow>>;

    /// Reads a product without locking it.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRow>>;

    /// Reads an order master.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Reads the detail lines under an order, in insertion order.
    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>>;

    /// Moves an order to a new status. Used by the staff flow only; not
    /// concurrency-sensitive.
    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()>;
}
