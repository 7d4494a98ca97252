//! Persistence layer for the storefront.
//!
//! Exposes the persisted data model, the [`CommerceStore`] trait, and two
//! backends: [`MemoryCommerceStore`] for tests and local development, and
//! [`PgCommerceStore`] backed by PostgreSQL.
//!
//! Checkout and cancellation mutate several independently-owned resources
//! (stock, credit balance, the order record, the cart). The store exposes
//! each of those as a single indivisible commit call so that no partially
//! applied checkout is ever observable, and re-validates the stock and
//! credit guards at write time.

mod error;
mod memory;
mod model;
mod postgres;
mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryCommerceStore;
pub use model::{
    Cart, CartItemRecord, CreditTransactionKind, CreditTransactionRecord, Order, OrderItemRecord,
    OrderRecord, OrderStatus, PaymentMethod, PaymentRecord, PaymentStatus, ProductRecord,
    UserRecord,
};
pub use postgres::PgCommerceStore;
pub use store::{CancellationWrites, CheckoutWrites, CommerceStore, CreditMovement};
