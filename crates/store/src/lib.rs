//! Relational store layer for the storefront.
//!
//! Two logical stores share one set of tables and one transactional seam:
//! the inventory store (product rows with locked reads and conditional
//! stock updates) and the order ledger (append-only order masters and
//! detail lines). The [`Storefront`] trait exposes both behind a single
//! `begin`/`commit`/`rollback` scope so the checkout coordinator can make
//! an order-plus-decrements all-or-nothing.

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod storefront;

pub use config::Config;
pub use error::{Result, StoreError};
pub use memory::{MemoryStorefront, MemoryTx};
pub use postgres::{PgStorefrontTx, PostgresStorefront};
pub use records::{OrderLine, OrderRecord, OrderStatus, ProductRow};
pub use storefront::{InventoryOps, LedgerOps, Storefront};
