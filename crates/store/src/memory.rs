use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, OrderId, ProductId, UserId};
use tokio::sync::RwLock;

use crate::{
    Cart, CartItemRecord, CreditTransactionRecord, Order, ProductRecord, Result, StoreError,
    UserRecord,
    store::{CancellationWrites, CheckoutWrites, CommerceStore, CreditMovement},
};

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<ProductId, ProductRecord>,
    users: HashMap<UserId, UserRecord>,
    credit_log: Vec<CreditTransactionRecord>,
    carts: HashMap<UserId, Vec<CartItemRecord>>,
    orders: HashMap<OrderId, Order>,
}

impl MemoryState {
    /// Checks every guard in a checkout batch without mutating anything.
    fn validate_checkout(&self, writes: &CheckoutWrites) -> Result<()> {
        for (product_id, qty) in &writes.stock_decrements {
            let product = self
                .products
                .get(product_id)
                .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;
            if product.stock < i64::from(*qty) {
                return Err(StoreError::StockUnderflow {
                    product_id: product_id.clone(),
                    available: product.stock,
                    requested: *qty,
                });
            }
        }

        if let Some(debit) = &writes.credit_debit {
            let user = self
                .users
                .get(&debit.user_id)
                .ok_or(StoreError::UserNotFound(debit.user_id))?;
            let required = -debit.amount;
            if user.credit_balance < required {
                return Err(StoreError::InsufficientCredit {
                    available: user.credit_balance,
                    required,
                });
            }
        }

        Ok(())
    }

    fn apply_movement(&mut self, movement: CreditMovement) {
        if let Some(user) = self.users.get_mut(&movement.user_id) {
            user.credit_balance += movement.amount;
        }
        self.credit_log.push(movement.ledger_row);
    }
}

/// In-memory commerce store for tests and local development.
///
/// Each atomic unit validates every guard and then applies every write
/// while holding the single write lock, so no partially applied batch is
/// ever observable and the guards cannot race.
#[derive(Clone, Default)]
pub struct MemoryCommerceStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryCommerceStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of credit ledger rows across all users.
    pub async fn credit_log_len(&self) -> usize {
        self.state.read().await.credit_log.len()
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl CommerceStore for MemoryCommerceStore {
    async fn insert_product(&self, product: ProductRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn find_product(&self, id: &ProductId) -> Result<Option<ProductRecord>> {
        let state = self.state.read().await;
        Ok(state.products.get(id).cloned())
    }

    async fn set_price(
        &self,
        id: &ProductId,
        price: Money,
        sale_percent: Option<i32>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(id)
            .ok_or_else(|| StoreError::ProductNotFound(id.clone()))?;
        product.price = price;
        product.sale_percent = sale_percent;
        Ok(())
    }

    async fn insert_user(&self, user: UserRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.users.insert(user.id, user);
        Ok(())
    }

    async fn credit_balance(&self, user_id: UserId) -> Result<Money> {
        let state = self.state.read().await;
        state
            .users
            .get(&user_id)
            .map(|u| u.credit_balance)
            .ok_or(StoreError::UserNotFound(user_id))
    }

    async fn credit_history(&self, user_id: UserId) -> Result<Vec<CreditTransactionRecord>> {
        let state = self.state.read().await;
        Ok(state
            .credit_log
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn credit_adjust(&self, movement: CreditMovement) -> Result<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get(&movement.user_id)
            .ok_or(StoreError::UserNotFound(movement.user_id))?;

        if movement.amount.is_negative() {
            let required = -movement.amount;
            if user.credit_balance < required {
                return Err(StoreError::InsufficientCredit {
                    available: user.credit_balance,
                    required,
                });
            }
        }

        state.apply_movement(movement);
        Ok(())
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        let state = self.state.read().await;
        Ok(Cart {
            user_id: Some(user_id),
            items: state.carts.get(&user_id).cloned().unwrap_or_default(),
        })
    }

    async fn upsert_cart_item(&self, user_id: UserId, item: CartItemRecord) -> Result<()> {
        let mut state = self.state.write().await;
        let items = state.carts.entry(user_id).or_default();
        match items.iter_mut().find(|i| i.product_id == item.product_id) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
        Ok(())
    }

    async fn remove_cart_item(&self, user_id: UserId, product_id: &ProductId) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(items) = state.carts.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = items.len();
        items.retain(|i| &i.product_id != product_id);
        Ok(items.len() < before)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.header.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.header.created_at.cmp(&a.header.created_at));
        Ok(orders)
    }

    async fn commit_checkout(&self, writes: CheckoutWrites) -> Result<()> {
        let mut state = self.state.write().await;

        // Re-validate every guard inside the critical section before any
        // mutation; a failure here leaves the state untouched.
        state.validate_checkout(&writes)?;

        for (product_id, qty) in &writes.stock_decrements {
            if let Some(product) = state.products.get_mut(product_id) {
                product.stock -= i64::from(*qty);
            }
        }

        if let Some(debit) = writes.credit_debit {
            state.apply_movement(debit);
        }

        if let Some(items) = state.carts.get_mut(&writes.clear_cart_for) {
            items.clear();
        }

        state.orders.insert(
            writes.order.id,
            Order {
                header: writes.order,
                items: writes.items,
                payment: writes.payment,
            },
        );

        Ok(())
    }

    async fn commit_cancellation(&self, writes: CancellationWrites) -> Result<()> {
        let mut state = self.state.write().await;

        // Validate under the write lock: the status guard closes the
        // window between the caller's precondition check and this commit.
        let order = state
            .orders
            .get(&writes.order_id)
            .ok_or(StoreError::OrderNotFound(writes.order_id))?;
        if !order.header.status.is_cancellable() {
            return Err(StoreError::OrderNotCancellable {
                order_id: writes.order_id,
                status: order.header.status,
            });
        }
        for (product_id, _) in &writes.stock_increments {
            if !state.products.contains_key(product_id) {
                return Err(StoreError::ProductNotFound(product_id.clone()));
            }
        }
        if let Some(refund) = &writes.refund
            && !state.users.contains_key(&refund.user_id)
        {
            return Err(StoreError::UserNotFound(refund.user_id));
        }

        for (product_id, qty) in &writes.stock_increments {
            if let Some(product) = state.products.get_mut(product_id) {
                product.stock += i64::from(*qty);
            }
        }

        if let Some(refund) = writes.refund {
            state.apply_movement(refund);
        }

        let order = state
            .orders
            .get_mut(&writes.order_id)
            .ok_or(StoreError::OrderNotFound(writes.order_id))?;
        order.header.status = crate::OrderStatus::Cancelled;
        if let Some(status) = writes.payment_status {
            order.payment.status = status;
        }

        Ok(())
    }
}
