use common::{Money, OrderId, ProductId, UserId};
use thiserror::Error;

use crate::model::OrderStatus;

/// Errors that can occur when interacting with the commerce store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A guarded stock decrement would have driven stock negative.
    #[error("insufficient stock for product {product_id}: {available} available, {requested} requested")]
    StockUnderflow {
        product_id: ProductId,
        available: i64,
        requested: u32,
    },

    /// A guarded credit debit would have driven the balance negative.
    #[error("insufficient credit: {available} available, {required} required")]
    InsufficientCredit { available: Money, required: Money },

    /// The order's status no longer permits cancellation.
    /// Raised by the write-time guard, not the precondition check.
    #[error("order {order_id} cannot be cancelled in status {status}")]
    OrderNotCancellable {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// The product does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// The user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// The order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A persisted value could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
