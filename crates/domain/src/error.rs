//! Domain error taxonomy.

use common::{Money, OrderId, ProductId, UserId};
use store::{OrderStatus, StoreError};
use thiserror::Error;

/// Errors surfaced by checkout and cancellation.
///
/// Guard failures detected inside the atomic unit are translated into
/// the same variants the precondition phase produces, so callers see one
/// error vocabulary regardless of which phase caught the problem.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user has no cart, or the cart has no items.
    #[error("cart is empty")]
    EmptyCart,

    /// The shipping or billing address does not exist, is soft-deleted,
    /// or belongs to another user.
    #[error("address not found")]
    AddressNotFound,

    /// The credit balance does not cover the order total.
    #[error("insufficient credit: {available} available, {required} required")]
    InsufficientCredit { available: Money, required: Money },

    /// A product's stock does not cover the requested quantity.
    #[error(
        "insufficient stock for product {product_id}: {available} available, {requested} requested"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: u32,
    },

    /// The order does not exist or belongs to another user.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order's status forbids the attempted transition.
    #[error("order in status {status} cannot be cancelled")]
    InvalidStateTransition { status: OrderStatus },

    /// A store-level abort (deadlock, connection loss). Nothing was
    /// committed; the caller may retry.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StockUnderflow {
                product_id,
                available,
                requested,
            } => CheckoutError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            StoreError::InsufficientCredit {
                available,
                required,
            } => CheckoutError::InsufficientCredit {
                available,
                required,
            },
            StoreError::OrderNotCancellable { status, .. } => {
                CheckoutError::InvalidStateTransition { status }
            }
            StoreError::OrderNotFound(id) => CheckoutError::OrderNotFound(id),
            other => CheckoutError::TransactionFailed(other.to_string()),
        }
    }
}

/// Errors surfaced by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product is inactive or soft-deleted.
    #[error("product not available: {0}")]
    ProductUnavailable(ProductId),

    /// Quantity must be at least one.
    #[error("invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    /// The cart has no line for this product.
    #[error("cart item not found: {0}")]
    ItemNotFound(ProductId),

    /// An error occurred in the store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by credit operations.
#[derive(Debug, Error)]
pub enum CreditError {
    /// The signup bonus was already granted to this user.
    #[error("initial bonus already granted to user {0}")]
    BonusAlreadyGranted(UserId),

    /// A debit adjustment would overdraw the balance.
    #[error("insufficient credit: {available} available, {required} required")]
    InsufficientCredit { available: Money, required: Money },

    /// Zero-amount adjustments are rejected.
    #[error("adjustment amount must be non-zero")]
    ZeroAmount,

    /// The user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// An error occurred in the store.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CreditError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserNotFound(id) => CreditError::UserNotFound(id),
            StoreError::InsufficientCredit {
                available,
                required,
            } => CreditError::InsufficientCredit {
                available,
                required,
            },
            other => CreditError::Store(other),
        }
    }
}
