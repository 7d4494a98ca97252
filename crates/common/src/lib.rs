//! Shared types for the storefront workspace.

mod types;

pub use types::{AddressId, Money, OrderId, ProductId, UserId};
