//! Row types shared by the inventory store and the order ledger.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A product row as held by the inventory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRow {
    /// Product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Category used for catalog ordering.
    pub category: String,
    /// Authoritative unit price.
    pub price: Money,
    /// Units on hand. Never negative.
    pub stock: i32,
}

impl ProductRow {
    /// Returns true if at least one unit is on hand.
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Lifecycle status of a persisted order.
///
/// Checkout always creates orders as `Pending`; later transitions are
/// driven by the staff dashboards through [`update_status`].
///
/// [`update_status`]: crate::Storefront::update_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Newly placed, awaiting staff action.
    Pending,
    /// Being prepared.
    Processing,
    /// Handed to a delivery person.
    OutForDelivery,
    /// Received by the customer.
    Delivered,
    /// Cancelled by staff.
    Cancelled,
}

impl OrderStatus {
    /// Returns the canonical string stored in the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::OutForDelivery => "OutForDelivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "Processing" => Ok(OrderStatus::Processing),
            "OutForDelivery" => Ok(OrderStatus::OutForDelivery),
            "Delivered" => Ok(OrderStatus::Delivered),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(StoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// An order master row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Order identifier.
    pub id: OrderId,
    /// The customer who placed the order.
    pub user_id: UserId,
    /// Total charged, as computed at checkout time.
    pub total: Money,
    /// Opaque payment method label. Never settled by this system.
    pub payment_method: String,
    /// Free-form delivery address.
    pub delivery_address: String,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// When the order was committed.
    pub created_at: DateTime<Utc>,
}

/// A single detail line under an order master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// The owning order.
    pub order_id: OrderId,
    /// The product sold.
    pub product_id: ProductId,
    /// Units sold on this line.
    pub quantity: u32,
    /// Unit price captured under lock at commit time.
    pub unit_price: Money,
    /// `quantity * unit_price`.
    pub total: Money,
}
