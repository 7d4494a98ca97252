//! Checkout and cancellation orchestrators.
//!
//! Checkout reconciles four independently-owned resources — the cart,
//! product stock, the credit balance, and the order/payment record — in
//! one atomic store commit. The precondition phase fails fast without
//! mutating anything; the guards are re-validated by the store at write
//! time, so a concurrent request that exhausts stock or credit in the
//! interim aborts the whole unit and surfaces the same typed error.

use std::sync::Arc;

use chrono::Utc;
use common::{AddressId, Money, OrderId, UserId};
use store::{
    CancellationWrites, Cart, CheckoutWrites, CommerceStore, CreditMovement,
    CreditTransactionKind, CreditTransactionRecord, Order, OrderItemRecord, OrderRecord,
    OrderStatus, PaymentMethod, PaymentRecord, PaymentStatus,
};

use crate::address::AddressBook;
use crate::audit::{AuditSink, PaymentAuditRecord};
use crate::error::CheckoutError;

/// Checkout instructions for one user.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub shipping_address_id: AddressId,
    /// Consulted only when `use_same_address_for_billing` is false.
    pub billing_address_id: Option<AddressId>,
    pub payment_method: PaymentMethod,
    pub use_same_address_for_billing: bool,
}

/// Orchestrates order placement and cancellation.
///
/// This service exclusively owns the write path that creates orders and
/// mutates stock and credit; nothing else calls the store's commit
/// methods.
pub struct CheckoutService<S, B, A> {
    store: S,
    addresses: B,
    audit: Arc<A>,
}

impl<S, B, A> CheckoutService<S, B, A>
where
    S: CommerceStore,
    B: AddressBook,
    A: AuditSink + 'static,
{
    /// Creates a new checkout service.
    pub fn new(store: S, addresses: B, audit: Arc<A>) -> Self {
        Self {
            store,
            addresses,
            audit,
        }
    }

    /// Places an order from the user's cart.
    ///
    /// On success the order, its items and payment are durable, stock is
    /// decremented, a credit payment is debited against the ledger, and
    /// the cart is emptied — all as one unit. On any failure nothing is
    /// committed and the cart is unchanged.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<Order, CheckoutError> {
        let cart = self.store.get_cart(request.user_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let shipping = self
            .addresses
            .find_owned(request.user_id, request.shipping_address_id)
            .await
            .ok_or(CheckoutError::AddressNotFound)?;

        let billing_address_id = match (
            request.use_same_address_for_billing,
            request.billing_address_id,
        ) {
            (false, Some(billing_id)) => {
                self.addresses
                    .find_owned(request.user_id, billing_id)
                    .await
                    .ok_or(CheckoutError::AddressNotFound)?;
                billing_id
            }
            _ => shipping.id,
        };

        let total = cart.total_amount();

        if request.payment_method == PaymentMethod::Credit {
            let available = self.store.credit_balance(request.user_id).await?;
            if available < total {
                return Err(CheckoutError::InsufficientCredit {
                    available,
                    required: total,
                });
            }
        }

        let writes = self
            .build_checkout_writes(&request, &cart, billing_address_id, total)
            .await?;
        let order = Order {
            header: writes.order.clone(),
            items: writes.items.clone(),
            payment: writes.payment.clone(),
        };

        if let Err(err) = self.store.commit_checkout(writes).await {
            metrics::counter!("storefront_checkouts_total", "outcome" => "failure").increment(1);
            return Err(err.into());
        }
        metrics::counter!("storefront_checkouts_total", "outcome" => "success").increment(1);
        tracing::info!(order_id = %order.header.id, total = %total, "order placed");

        self.spawn_audit(PaymentAuditRecord::new(
            order.header.id,
            request.user_id,
            order.payment.status,
            total,
            request.payment_method,
        ));

        Ok(order)
    }

    /// Cancels an order, reversing its checkout effects.
    ///
    /// Stock is always returned; a settled store-credit payment is
    /// refunded to the balance and its ledger. Cancellation is one-way
    /// and one-time per order.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, user_id: UserId, order_id: OrderId) -> Result<(), CheckoutError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .filter(|o| o.header.user_id == user_id)
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        if !order.header.status.is_cancellable() {
            return Err(CheckoutError::InvalidStateTransition {
                status: order.header.status,
            });
        }

        let stock_increments = order
            .items
            .iter()
            .map(|item| (item.product_id.clone(), item.quantity))
            .collect();

        let refundable = order.payment.provider == PaymentMethod::Credit
            && order.payment.status == PaymentStatus::Success;
        let (refund, payment_status) = if refundable {
            let amount = order.header.total;
            (
                Some(CreditMovement {
                    user_id,
                    amount,
                    ledger_row: CreditTransactionRecord::new(
                        user_id,
                        amount,
                        CreditTransactionKind::RefundCredit,
                        Some(order_id),
                        format!("refund for cancelled order {order_id}"),
                    ),
                }),
                // The payment record reuses FAILED for "voided by
                // cancellation"; see DESIGN.md.
                Some(PaymentStatus::Failed),
            )
        } else {
            (None, None)
        };

        if let Err(err) = self
            .store
            .commit_cancellation(CancellationWrites {
                order_id,
                stock_increments,
                refund,
                payment_status,
            })
            .await
        {
            metrics::counter!("storefront_cancellations_total", "outcome" => "failure")
                .increment(1);
            return Err(err.into());
        }
        metrics::counter!("storefront_cancellations_total", "outcome" => "success").increment(1);
        tracing::info!(%order_id, "order cancelled");

        self.spawn_audit(PaymentAuditRecord::new(
            order_id,
            user_id,
            PaymentStatus::Refunded,
            order.header.total,
            order.payment.provider,
        ));

        Ok(())
    }

    /// Loads an order, scoped to its owner.
    pub async fn get_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, CheckoutError> {
        Ok(self
            .store
            .get_order(order_id)
            .await?
            .filter(|o| o.header.user_id == user_id))
    }

    /// Lists a user's orders, newest first.
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, CheckoutError> {
        Ok(self.store.list_orders(user_id).await?)
    }

    async fn build_checkout_writes(
        &self,
        request: &CheckoutRequest,
        cart: &Cart,
        billing_address_id: AddressId,
        total: Money,
    ) -> Result<CheckoutWrites, CheckoutError> {
        let is_credit = request.payment_method == PaymentMethod::Credit;
        let order_id = OrderId::new();

        // Verify live stock per line before entering the atomic phase,
        // and capture each product's current sale discount on the order
        // line. The price itself comes from the cart's captured value.
        let mut items = Vec::with_capacity(cart.items.len());
        let mut stock_decrements = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            let product = self.store.find_product(&line.product_id).await?;
            let (available, sale_percent) = match &product {
                Some(p) => (p.stock, p.sale_percent),
                None => (0, None),
            };
            if available < i64::from(line.quantity) {
                return Err(CheckoutError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    available,
                    requested: line.quantity,
                });
            }
            items.push(OrderItemRecord {
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                sale_percent_captured: sale_percent,
            });
            stock_decrements.push((line.product_id.clone(), line.quantity));
        }

        let credit_debit = is_credit.then(|| CreditMovement {
            user_id: request.user_id,
            amount: -total,
            ledger_row: CreditTransactionRecord::new(
                request.user_id,
                -total,
                CreditTransactionKind::PurchaseDebit,
                Some(order_id),
                format!("payment for order {order_id}"),
            ),
        });

        Ok(CheckoutWrites {
            order: OrderRecord {
                id: order_id,
                user_id: request.user_id,
                status: if is_credit {
                    OrderStatus::Paid
                } else {
                    OrderStatus::Pending
                },
                total,
                shipping_address_id: request.shipping_address_id,
                billing_address_id,
                created_at: Utc::now(),
            },
            items,
            payment: PaymentRecord {
                order_id,
                status: if is_credit {
                    PaymentStatus::Success
                } else {
                    PaymentStatus::Pending
                },
                provider: request.payment_method,
                amount: total,
                transaction_id: None,
            },
            stock_decrements,
            credit_debit,
            clear_cart_for: request.user_id,
        })
    }

    /// Queues the audit write after commit. Best-effort: a sink failure
    /// is logged and never reaches the caller.
    fn spawn_audit(&self, record: PaymentAuditRecord) {
        let audit = Arc::clone(&self.audit);
        tokio::spawn(async move {
            let order_id = record.order_id;
            if let Err(err) = audit.record_payment(record).await {
                tracing::warn!(%order_id, error = %err, "audit record dropped");
            }
        });
    }
}
