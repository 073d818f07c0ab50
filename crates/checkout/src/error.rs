//! Checkout error taxonomy.

use common::{Money, ProductId};
use store::StoreError;
use thiserror::Error;

/// A precondition violated before any transaction is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The cart holds no items.
    #[error("cart is empty")]
    EmptyCart,

    /// No payment method was supplied.
    #[error("payment method is required")]
    MissingPaymentMethod,

    /// No delivery address was supplied.
    #[error("delivery address is required")]
    MissingDeliveryAddress,
}

/// Errors that can occur during checkout.
///
/// Every variant other than `Validation` aborts the in-flight transaction;
/// none are retried automatically. The caller surfaces the failure and the
/// user resubmits, typically with a refreshed cart.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A precondition failed; no transaction was opened.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A cart item references a product that no longer exists.
    #[error("Product {0} not found")]
    NotFound(ProductId),

    /// The locked stock for a product was below one unit.
    #[error("Product {0} is out of stock")]
    OutOfStock(ProductId),

    /// The authoritative price drifted more than one cent from the cart
    /// snapshot. Carries the current price so the caller can refresh.
    #[error("Price of product {product_id} changed to {current_price}")]
    PriceChanged {
        product_id: ProductId,
        current_price: Money,
    },

    /// The conditional decrement affected zero rows, or the row lock wait
    /// was aborted by the store. Retryable by resubmitting the cart.
    #[error("Stock of product {0} changed concurrently")]
    ConcurrentStockChange(ProductId),

    /// The store itself failed; nothing was persisted.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            // A bounded lock wait that gives up is indistinguishable, from
            // the caller's point of view, from losing a stock race.
            StoreError::LockContended(product_id) => {
                CheckoutError::ConcurrentStockChange(product_id)
            }
            other => CheckoutError::Store(other),
        }
    }
}

/// Result type for checkout operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;
