use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use common::{Money, OrderId, ProductId, UserId};

use crate::error::Result;
use crate::records::{OrderLine, OrderRecord, OrderStatus, ProductRow};
use crate::storefront::{InventoryOps, LedgerOps, Storefront};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: HashMap<ProductId, ProductRow>,
    orders: HashMap<OrderId, OrderRecord>,
    lines: Vec<OrderLine>,
}

/// In-memory storefront store for testing.
///
/// Transactions take the whole-store mutex for their lifetime; the coarse
/// lock stands in for per-row locks and gives the same total ordering of
/// decrements the row lock guarantees per product. Writes are staged on a
/// working copy, so commit and rollback are atomic the same way the
/// PostgreSQL implementation's are.
#[derive(Clone, Default)]
pub struct MemoryStorefront {
    state: Arc<Mutex<MemoryState>>,
    begins: Arc<AtomicU64>,
    fail_decrements: Arc<AtomicBool>,
}

impl MemoryStorefront {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a product and returns its generated id.
    pub async fn seed_product(
        &self,
        name: impl Into<String>,
        category: impl Into<String>,
        price: Money,
        stock: i32,
    ) -> ProductId {
        let id = ProductId::new();
        let row = ProductRow {
            id,
            name: name.into(),
            category: category.into(),
            price,
            stock,
        };
        self.state.lock().await.products.insert(id, row);
        id
    }

    /// Overwrites a product's authoritative price.
    pub async fn set_price(&self, product_id: ProductId, price: Money) {
        if let Some(row) = self.state.lock().await.products.get_mut(&product_id) {
            row.price = price;
        }
    }

    /// Removes a product entirely.
    pub async fn delete_product(&self, product_id: ProductId) {
        self.state.lock().await.products.remove(&product_id);
    }

    /// Configures every subsequent conditional decrement to affect zero
    /// rows, simulating stock snatched away between lock and update.
    pub fn set_fail_decrements(&self, fail: bool) {
        self.fail_decrements.store(fail, Ordering::SeqCst);
    }

    /// Returns the current stock of a product.
    pub async fn stock_of(&self, product_id: ProductId) -> Option<i32> {
        self.state
            .lock()
            .await
            .products
            .get(&product_id)
            .map(|row| row.stock)
    }

    /// Returns the number of committed order masters.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the number of committed detail lines.
    pub async fn line_count(&self) -> usize {
        self.state.lock().await.lines.len()
    }

    /// Returns how many transactions have been opened.
    pub fn begin_count(&self) -> u64 {
        self.begins.load(Ordering::SeqCst)
    }
}

/// One open transaction over the in-memory store.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_decrements: Arc<AtomicBool>,
}

#[async_trait]
impl InventoryOps for MemoryTx {
    async fn lock_and_read(&mut self, product_id: ProductId) -> Result<Option<ProductRow>> {
        // The store mutex is already held for the transaction's lifetime,
        // so the read is a lookup on the working copy.
        Ok(self.working.products.get(&product_id).cloned())
    }

    async fn decrement_if_positive(&mut self, product_id: ProductId) -> Result<u64> {
        if self.fail_decrements.load(Ordering::SeqCst) {
            return Ok(0);
        }

        match self.working.products.get_mut(&product_id) {
            Some(row) if row.stock > 0 => {
                row.stock -= 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn increment(&mut self, product_id: ProductId) -> Result<()> {
        if let Some(row) = self.working.products.get_mut(&product_id) {
            row.stock += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerOps for MemoryTx {
    async fn create_master(
        &mut self,
        user_id: UserId,
        total: Money,
        payment_method: &str,
        delivery_address: &str,
    ) -> Result<OrderId> {
        let order_id = OrderId::new();
        let record = OrderRecord {
            id: order_id,
            user_id,
            total,
            payment_method: payment_method.to_string(),
            delivery_address: delivery_address.to_string(),
            status: OrderStatus::Pending,
            created_at: chrono::Utc::now(),
        };
        self.working.orders.insert(order_id, record);
        Ok(order_id)
    }

    async fn append_detail(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<()> {
        self.working.lines.push(OrderLine {
            order_id,
            product_id,
            quantity,
            unit_price,
            total: unit_price.multiply(quantity),
        });
        Ok(())
    }
}

#[async_trait]
impl Storefront for MemoryStorefront {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx {
            guard,
            working,
            fail_decrements: self.fail_decrements.clone(),
        })
    }

    async fn commit(&self, tx: Self::Tx) -> Result<()> {
        let MemoryTx {
            mut guard, working, ..
        } = tx;
        *guard = working;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        // Dropping the transaction discards the working copy and releases
        // the store mutex.
        drop(tx);
        Ok(())
    }

    async fn list_available(&self) -> Result<Vec<ProductRow>> {
        let state = self.state.lock().await;
        let mut rows: Vec<ProductRow> = state
            .products
            .values()
            .filter(|row| row.stock > 0)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        Ok(rows)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRow>> {
        Ok(self.state.lock().await.products.get(&product_id).cloned())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.state.lock().await.orders.get(&order_id).cloned())
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        Ok(self
            .state
            .lock()
            .await
            .lines
            .iter()
            .filter(|line| line.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        if let Some(record) = self.state.lock().await.orders.get_mut(&order_id) {
            record.status = status;
        }
        Ok(())
    }
}
