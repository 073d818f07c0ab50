//! Checkout transaction coordinator for the storefront.
//!
//! Converts a session-held cart into exactly one persisted order inside a
//! single atomic scope:
//! 1. Insert the order master with the cart's snapshot total.
//! 2. Per item, in cart order: lock the product row, re-validate existence,
//!    stock, and price drift, append the detail line at the locked price,
//!    and conditionally decrement stock.
//! 3. Commit and clear the cart, or drain the compensation list and abort.
//!
//! Stock never goes negative, charged prices match the authoritative values
//! observed under lock, and a failed checkout leaves no residue.

pub mod coordinator;
pub mod error;

pub use coordinator::CheckoutCoordinator;
pub use error::{CheckoutError, Result, ValidationError};
