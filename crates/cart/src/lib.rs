//! Per-session cart holder.
//!
//! The cart is an ordered collection of line-item snapshots taken at the
//! moment a product is added. It offers no freshness guarantee against the
//! inventory: the checkout coordinator re-validates every field under a row
//! lock before committing. Each entry represents one unit; duplicates
//! represent multiple units of the same product.
//!
//! A cart is owned by its session and passed explicitly into the checkout
//! coordinator; it is never persisted or shared between requests.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// A snapshot of a product taken when it was added to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// The product this entry refers to.
    pub product_id: ProductId,
    /// Product name as displayed when the item was added.
    pub name: String,
    /// Unit price at add time. May drift from the authoritative price.
    pub price: Money,
}

impl CartItem {
    /// Creates a new cart item snapshot.
    pub fn new(product_id: ProductId, name: impl Into<String>, price: Money) -> Self {
        Self {
            product_id,
            name: name.into(),
            price,
        }
    }
}

/// Ordered collection of cart line items for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a snapshot of the given product.
    pub fn add(&mut self, product_id: ProductId, name: impl Into<String>, price: Money) {
        self.items.push(CartItem::new(product_id, name, price));
    }

    /// Removes the item at `index`. Out-of-range indexes are a no-op.
    pub fn remove(&mut self, index: usize) {
        if index < self.items.len() {
            self.items.remove(index);
        }
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Returns the items in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Returns true if the cart holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of line items (units) in the cart.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Sum of the snapshot prices, as shown on the cart page.
    ///
    /// This is a display total only; the charged total is recomputed from
    /// authoritative prices at checkout.
    pub fn total(&self) -> Money {
        self.items.iter().map(|item| item.price).sum()
    }
}
