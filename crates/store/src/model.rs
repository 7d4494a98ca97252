//! Persisted data model: products, carts, orders, payments, credit ledger.

use chrono::{DateTime, Utc};
use common::{AddressId, Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
    Shipped,
    Completed,
}

impl OrderStatus {
    /// Returns the persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Completed => "COMPLETED",
        }
    }

    /// Returns true if the order may still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            "FAILED" => Ok(OrderStatus::Failed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "COMPLETED" => Ok(OrderStatus::Completed),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an order's payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Returns the persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment method selected at checkout.
///
/// `Credit` settles against the user's store-credit balance; `Dummy` and
/// `Cash` stand in for external settlement and leave the payment pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Credit,
    Dummy,
    Cash,
}

impl PaymentMethod {
    /// Returns the persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Credit => "CREDIT",
            PaymentMethod::Dummy => "DUMMY",
            PaymentMethod::Cash => "CASH",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT" => Ok(PaymentMethod::Credit),
            "DUMMY" => Ok(PaymentMethod::Dummy),
            "CASH" => Ok(PaymentMethod::Cash),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a credit ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditTransactionKind {
    InitialBonus,
    PurchaseDebit,
    RefundCredit,
    AdminAdjust,
}

impl CreditTransactionKind {
    /// Returns the persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditTransactionKind::InitialBonus => "INITIAL_BONUS",
            CreditTransactionKind::PurchaseDebit => "PURCHASE_DEBIT",
            CreditTransactionKind::RefundCredit => "REFUND_CREDIT",
            CreditTransactionKind::AdminAdjust => "ADMIN_ADJUST",
        }
    }
}

impl std::str::FromStr for CreditTransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIAL_BONUS" => Ok(CreditTransactionKind::InitialBonus),
            "PURCHASE_DEBIT" => Ok(CreditTransactionKind::PurchaseDebit),
            "REFUND_CREDIT" => Ok(CreditTransactionKind::RefundCredit),
            "ADMIN_ADJUST" => Ok(CreditTransactionKind::AdminAdjust),
            other => Err(format!("unknown credit transaction kind: {other}")),
        }
    }
}

impl std::fmt::Display for CreditTransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog product, reduced to the fields the checkout core touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    /// Undiscounted unit price.
    pub price: Money,
    /// Active sale discount, 1..=100, if any.
    pub sale_percent: Option<i32>,
    /// On-hand stock. Never negative.
    pub stock: i64,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ProductRecord {
    /// Returns true if the product can currently be added to a cart.
    pub fn is_purchasable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    /// Returns the unit price with any active sale discount applied.
    pub fn sale_price(&self) -> Money {
        self.price.with_discount_percent(self.sale_percent.unwrap_or(0))
    }
}

/// A cart line with the unit price captured at add/update time.
///
/// The captured price is what checkout charges; later catalog price
/// changes never affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemRecord {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItemRecord {
    /// Returns the line total (captured price × quantity).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A user's cart. One per user, created lazily, emptied (not deleted) on
/// successful checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: Option<UserId>,
    pub items: Vec<CartItemRecord>,
}

impl Cart {
    /// Returns true if the cart has no items (or was never created).
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the sum of all line totals.
    pub fn total_amount(&self) -> Money {
        self.items
            .iter()
            .fold(Money::zero(), |acc, item| acc + item.line_total())
    }
}

/// Order header row. Immutable after creation except for `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    /// Total fixed at creation from the cart's captured prices.
    pub total: Money,
    pub shipping_address_id: AddressId,
    pub billing_address_id: AddressId,
    pub created_at: DateTime<Utc>,
}

/// Order line with price and discount captured at order-creation time.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub sale_percent_captured: Option<i32>,
}

/// Payment record, 1:1 with its order. Only `status` ever changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub order_id: OrderId,
    pub status: PaymentStatus,
    pub provider: PaymentMethod,
    pub amount: Money,
    pub transaction_id: Option<String>,
}

/// A full order: header, lines, and the payment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub header: OrderRecord,
    pub items: Vec<OrderItemRecord>,
    pub payment: PaymentRecord,
}

/// Append-only credit ledger row. The user's materialized balance always
/// equals the sum of these rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransactionRecord {
    pub id: Uuid,
    pub user_id: UserId,
    /// Signed amount: negative for debits, positive for credits.
    pub amount: Money,
    pub kind: CreditTransactionKind,
    pub reference_id: Option<OrderId>,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl CreditTransactionRecord {
    /// Creates a ledger row timestamped now.
    pub fn new(
        user_id: UserId,
        amount: Money,
        kind: CreditTransactionKind,
        reference_id: Option<OrderId>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            kind,
            reference_id,
            note: note.into(),
            created_at: Utc::now(),
        }
    }
}

/// User account row, reduced to the credit balance the core mutates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub credit_balance: Money,
}
