//! The [`CommerceStore`] trait and the atomic write batches.

use async_trait::async_trait;
use common::{Money, OrderId, ProductId, UserId};

use crate::error::Result;
use crate::model::{
    Cart, CartItemRecord, CreditTransactionRecord, Order, OrderItemRecord, OrderRecord,
    PaymentRecord, PaymentStatus, ProductRecord, UserRecord,
};

/// A credit balance movement paired with its append-only ledger row.
///
/// Both are applied inside the same atomic unit so the materialized
/// balance always equals the sum of the ledger.
#[derive(Debug, Clone)]
pub struct CreditMovement {
    pub user_id: UserId,
    /// Signed: negative debits the balance, positive credits it.
    pub amount: Money,
    pub ledger_row: CreditTransactionRecord,
}

/// Everything a successful checkout writes, committed as one unit.
///
/// The stock decrements and the credit debit (if any) are guarded: the
/// store re-validates them at write time and fails the whole batch if a
/// concurrent request exhausted the resource in the interim.
#[derive(Debug, Clone)]
pub struct CheckoutWrites {
    pub order: OrderRecord,
    pub items: Vec<OrderItemRecord>,
    pub payment: PaymentRecord,
    /// Per-product quantities to subtract from stock.
    pub stock_decrements: Vec<(ProductId, u32)>,
    /// Present only for store-credit payments.
    pub credit_debit: Option<CreditMovement>,
    /// The cart whose items are deleted on commit. The cart row persists.
    pub clear_cart_for: UserId,
}

/// Everything a cancellation writes, committed as one unit.
#[derive(Debug, Clone)]
pub struct CancellationWrites {
    pub order_id: OrderId,
    /// Per-product quantities to return to stock. Stock is always
    /// returned, whatever the payment method.
    pub stock_increments: Vec<(ProductId, u32)>,
    /// Present only when a settled store-credit payment is reversed.
    pub refund: Option<CreditMovement>,
    /// New payment status, set only when a refund is issued.
    pub payment_status: Option<PaymentStatus>,
}

/// Storage contract for the storefront.
///
/// The two `commit_*` methods are the only write paths for stock levels,
/// credit balances, and order records; no other method (and no other
/// component) mutates them.
#[async_trait]
pub trait CommerceStore: Send + Sync {
    // -- Catalog --

    /// Inserts a product into the catalog.
    async fn insert_product(&self, product: ProductRecord) -> Result<()>;

    /// Looks up a product by SKU.
    async fn find_product(&self, id: &ProductId) -> Result<Option<ProductRecord>>;

    /// Updates a product's price and sale discount. Captured prices on
    /// existing carts and orders are unaffected.
    async fn set_price(
        &self,
        id: &ProductId,
        price: Money,
        sale_percent: Option<i32>,
    ) -> Result<()>;

    // -- Users & credit ledger --

    /// Inserts a user account.
    async fn insert_user(&self, user: UserRecord) -> Result<()>;

    /// Returns the user's materialized credit balance.
    async fn credit_balance(&self, user_id: UserId) -> Result<Money>;

    /// Returns the user's ledger rows, oldest first.
    async fn credit_history(&self, user_id: UserId) -> Result<Vec<CreditTransactionRecord>>;

    /// Applies a balance movement and appends its ledger row atomically.
    /// Debits are guarded against driving the balance negative.
    async fn credit_adjust(&self, movement: CreditMovement) -> Result<()>;

    // -- Cart --

    /// Returns the user's cart; an empty cart if none was ever created.
    async fn get_cart(&self, user_id: UserId) -> Result<Cart>;

    /// Inserts or replaces a cart line. The caller captures the price.
    async fn upsert_cart_item(&self, user_id: UserId, item: CartItemRecord) -> Result<()>;

    /// Removes a cart line. Returns false if the line did not exist.
    async fn remove_cart_item(&self, user_id: UserId, product_id: &ProductId) -> Result<bool>;

    // -- Orders --

    /// Loads a full order (header, items, payment).
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>>;

    // -- Atomic units --

    /// Commits a checkout: order + items + payment inserts, guarded stock
    /// decrements, optional guarded credit debit, cart clear. All or
    /// nothing; on any guard failure no write is applied.
    async fn commit_checkout(&self, writes: CheckoutWrites) -> Result<()>;

    /// Commits a cancellation: order status flip (guarded on the status
    /// still being cancellable), stock increments, optional refund with
    /// its payment status flip. All or nothing.
    async fn commit_cancellation(&self, writes: CancellationWrites) -> Result<()>;
}
