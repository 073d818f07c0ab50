//! Checkout transaction coordinator.

use cart::Cart;
use common::{OrderId, ProductId, UserId};
use store::{InventoryOps, LedgerOps, Storefront};

use crate::error::{CheckoutError, ValidationError};

/// Largest tolerated drift, in cents, between a cart snapshot price and the
/// authoritative price read under lock.
const PRICE_DRIFT_TOLERANCE_CENTS: i64 = 1;

/// Orchestrates the conversion of a cart into exactly one persisted order.
///
/// The coordinator drives the inventory store and the order ledger inside
/// one transaction: master row first, then per item a locked read,
/// re-validation, detail line, and conditional decrement. Any failure
/// drains the compensation list and aborts the whole scope, so no partial
/// order is ever durably visible.
pub struct CheckoutCoordinator<S: Storefront> {
    store: S,
}

impl<S: Storefront> CheckoutCoordinator<S> {
    /// Creates a new coordinator over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Converts the cart into one persisted order, or nothing.
    ///
    /// On success the cart is cleared and the new order id returned. On
    /// failure the cart is untouched, no order rows persist, and every
    /// stock value equals its pre-checkout value. The caller must resubmit
    /// with a refreshed cart; nothing is retried here.
    #[tracing::instrument(skip(self, cart), fields(%user_id, items = cart.len()))]
    pub async fn submit_checkout(
        &self,
        user_id: UserId,
        cart: &mut Cart,
        payment_method: &str,
        delivery_address: &str,
    ) -> Result<OrderId, CheckoutError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let start = std::time::Instant::now();

        // Preconditions, checked before any transaction is opened.
        if cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        if payment_method.trim().is_empty() {
            return Err(ValidationError::MissingPaymentMethod.into());
        }
        if delivery_address.trim().is_empty() {
            return Err(ValidationError::MissingDeliveryAddress.into());
        }

        let mut tx = self.store.begin().await?;
        let mut processed: Vec<ProductId> = Vec::with_capacity(cart.len());

        let outcome = Self::process_cart(
            &mut tx,
            user_id,
            cart,
            payment_method,
            delivery_address,
            &mut processed,
        )
        .await;

        match outcome {
            Ok(order_id) => {
                self.store.commit(tx).await?;
                cart.clear();

                let duration = start.elapsed().as_secs_f64();
                metrics::histogram!("checkout_duration_seconds").record(duration);
                metrics::counter!("checkout_completed").increment(1);
                tracing::info!(%order_id, duration, "checkout committed");

                Ok(order_id)
            }
            Err(err) => {
                // Reverse the decrements already applied, then abort the
                // whole scope. Under a single-transaction store the
                // increments are discarded with everything else; they are
                // kept for stores that run steps outside one atomic scope.
                for product_id in processed.drain(..).rev() {
                    if let Err(comp_err) = tx.increment(product_id).await {
                        tracing::warn!(%product_id, error = %comp_err, "compensating increment failed");
                    }
                }
                if let Err(rb_err) = self.store.rollback(tx).await {
                    tracing::warn!(error = %rb_err, "rollback failed after checkout error");
                }

                metrics::counter!("checkout_failed").increment(1);
                tracing::warn!(%user_id, error = %err, "checkout aborted");

                Err(err)
            }
        }
    }

    /// Runs the per-item checkout steps inside an open transaction.
    ///
    /// Items are processed in the cart's stored order, one at a time; the
    /// row lock taken per product is the sole serialization point between
    /// concurrent checkouts.
    async fn process_cart(
        tx: &mut S::Tx,
        user_id: UserId,
        cart: &Cart,
        payment_method: &str,
        delivery_address: &str,
        processed: &mut Vec<ProductId>,
    ) -> Result<OrderId, CheckoutError> {
        // The master total is the naive sum of cart snapshot prices; items
        // whose authoritative price drifted past tolerance fail the whole
        // checkout below, so the totals can only disagree by cents.
        let naive_total = cart.total();

        let order_id = tx
            .create_master(user_id, naive_total, payment_method, delivery_address)
            .await?;

        for item in cart.items() {
            let row = tx
                .lock_and_read(item.product_id)
                .await?
                .ok_or(CheckoutError::NotFound(item.product_id))?;

            if row.stock < 1 {
                return Err(CheckoutError::OutOfStock(item.product_id));
            }

            if row.price.abs_diff(item.price).cents() > PRICE_DRIFT_TOLERANCE_CENTS {
                return Err(CheckoutError::PriceChanged {
                    product_id: item.product_id,
                    current_price: row.price,
                });
            }

            // The detail line carries the locked price, not the snapshot.
            tx.append_detail(order_id, item.product_id, 1, row.price)
                .await?;

            let affected = tx.decrement_if_positive(item.product_id).await?;
            if affected == 0 {
                return Err(CheckoutError::ConcurrentStockChange(item.product_id));
            }

            processed.push(item.product_id);
        }

        Ok(order_id)
    }
}
