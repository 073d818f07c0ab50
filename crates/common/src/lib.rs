//! Shared types for the storefront: identifier newtypes and `Money`.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{OrderId, ProductId, UserId};
