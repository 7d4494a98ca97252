use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, Money, OrderId, ProductId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Cart, CartItemRecord, CreditTransactionRecord, Order, OrderItemRecord, OrderRecord,
    PaymentRecord, ProductRecord, Result, StoreError, UserRecord,
    store::{CancellationWrites, CheckoutWrites, CommerceStore, CreditMovement},
};

/// PostgreSQL-backed commerce store.
///
/// Each atomic unit is one database transaction. The stock and credit
/// guards are conditional `UPDATE ... WHERE` statements: zero rows
/// affected means the guard no longer holds, the transaction is dropped
/// (rolled back), and the typed error is returned.
#[derive(Clone)]
pub struct PgCommerceStore {
    pool: PgPool,
}

impl PgCommerceStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database and wraps the pool in a store.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<ProductRecord> {
        Ok(ProductRecord {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            sale_percent: row.try_get("sale_percent")?,
            stock: row.try_get("stock")?,
            is_active: row.try_get("is_active")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    fn row_to_order_header(row: PgRow) -> Result<OrderRecord> {
        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            status: row
                .try_get::<String, _>("status")?
                .parse()
                .map_err(StoreError::Decode)?,
            total: Money::from_cents(row.try_get("total_cents")?),
            shipping_address_id: AddressId::from_uuid(row.try_get::<Uuid, _>("shipping_address_id")?),
            billing_address_id: AddressId::from_uuid(row.try_get::<Uuid, _>("billing_address_id")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn row_to_order_item(row: PgRow) -> Result<OrderItemRecord> {
        Ok(OrderItemRecord {
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: row.try_get::<i32, _>("quantity")? as u32,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            sale_percent_captured: row.try_get("sale_percent_captured")?,
        })
    }

    fn row_to_payment(row: PgRow) -> Result<PaymentRecord> {
        Ok(PaymentRecord {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            status: row
                .try_get::<String, _>("status")?
                .parse()
                .map_err(StoreError::Decode)?,
            provider: row
                .try_get::<String, _>("provider")?
                .parse()
                .map_err(StoreError::Decode)?,
            amount: Money::from_cents(row.try_get("amount_cents")?),
            transaction_id: row.try_get("transaction_id")?,
        })
    }

    fn row_to_ledger(row: PgRow) -> Result<CreditTransactionRecord> {
        Ok(CreditTransactionRecord {
            id: row.try_get("id")?,
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            kind: row
                .try_get::<String, _>("kind")?
                .parse()
                .map_err(StoreError::Decode)?,
            reference_id: row
                .try_get::<Option<Uuid>, _>("reference_id")?
                .map(OrderId::from_uuid),
            note: row.try_get("note")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    /// Applies a guarded stock mutation inside an open transaction.
    /// `delta` is negative for decrements; the `WHERE` clause keeps the
    /// resulting stock non-negative.
    async fn apply_stock_delta(
        tx: &mut sqlx::PgConnection,
        product_id: &ProductId,
        delta: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + $2 WHERE id = $1 AND stock + $2 >= 0",
        )
        .bind(product_id.as_str())
        .bind(delta)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                    .bind(product_id.as_str())
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match available {
                Some(available) => StoreError::StockUnderflow {
                    product_id: product_id.clone(),
                    available,
                    requested: (-delta) as u32,
                },
                None => StoreError::ProductNotFound(product_id.clone()),
            });
        }

        Ok(())
    }

    /// Applies a guarded balance movement and appends the ledger row
    /// inside an open transaction.
    async fn apply_credit_movement(
        tx: &mut sqlx::PgConnection,
        movement: &CreditMovement,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET credit_balance_cents = credit_balance_cents + $2 \
             WHERE id = $1 AND credit_balance_cents + $2 >= 0",
        )
        .bind(movement.user_id.as_uuid())
        .bind(movement.amount.cents())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT credit_balance_cents FROM users WHERE id = $1")
                    .bind(movement.user_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match available {
                Some(available) => StoreError::InsufficientCredit {
                    available: Money::from_cents(available),
                    required: -movement.amount,
                },
                None => StoreError::UserNotFound(movement.user_id),
            });
        }

        let row = &movement.ledger_row;
        sqlx::query(
            "INSERT INTO credit_transactions (id, user_id, amount_cents, kind, reference_id, note, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(row.id)
        .bind(row.user_id.as_uuid())
        .bind(row.amount.cents())
        .bind(row.kind.as_str())
        .bind(row.reference_id.map(|id| id.as_uuid()))
        .bind(&row.note)
        .bind(row.created_at)
        .execute(&mut *tx)
        .await?;

        Ok(())
    }

    async fn load_order_parts(&self, header: OrderRecord) -> Result<Order> {
        let item_rows = sqlx::query(
            "SELECT product_id, product_name, quantity, unit_price_cents, sale_percent_captured \
             FROM order_items WHERE order_id = $1 ORDER BY product_id",
        )
        .bind(header.id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        let items = item_rows
            .into_iter()
            .map(Self::row_to_order_item)
            .collect::<Result<Vec<_>>>()?;

        let payment_row = sqlx::query(
            "SELECT order_id, status, provider, amount_cents, transaction_id \
             FROM payments WHERE order_id = $1",
        )
        .bind(header.id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::Decode(format!("order {} has no payment row", header.id)))?;
        let payment = Self::row_to_payment(payment_row)?;

        Ok(Order {
            header,
            items,
            payment,
        })
    }
}

#[async_trait]
impl CommerceStore for PgCommerceStore {
    async fn insert_product(&self, product: ProductRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, name, price_cents, sale_percent, stock, is_active, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.sale_percent)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_product(&self, id: &ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            "SELECT id, name, price_cents, sale_percent, stock, is_active, deleted_at \
             FROM products WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_product).transpose()
    }

    async fn set_price(
        &self,
        id: &ProductId,
        price: Money,
        sale_percent: Option<i32>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE products SET price_cents = $2, sale_percent = $3 WHERE id = $1")
            .bind(id.as_str())
            .bind(price.cents())
            .bind(sale_percent)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(id.clone()));
        }
        Ok(())
    }

    async fn insert_user(&self, user: UserRecord) -> Result<()> {
        sqlx::query("INSERT INTO users (id, credit_balance_cents) VALUES ($1, $2)")
            .bind(user.id.as_uuid())
            .bind(user.credit_balance.cents())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn credit_balance(&self, user_id: UserId) -> Result<Money> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT credit_balance_cents FROM users WHERE id = $1")
                .bind(user_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        balance
            .map(Money::from_cents)
            .ok_or(StoreError::UserNotFound(user_id))
    }

    async fn credit_history(&self, user_id: UserId) -> Result<Vec<CreditTransactionRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_id, amount_cents, kind, reference_id, note, created_at \
             FROM credit_transactions WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_ledger).collect()
    }

    async fn credit_adjust(&self, movement: CreditMovement) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::apply_credit_movement(&mut tx, &movement).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        let rows = sqlx::query(
            "SELECT product_id, product_name, quantity, unit_price_cents \
             FROM cart_items WHERE user_id = $1 ORDER BY product_id",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|row| {
                Ok(CartItemRecord {
                    product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
                    product_name: row.try_get("product_name")?,
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                    unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Cart {
            user_id: Some(user_id),
            items,
        })
    }

    async fn upsert_cart_item(&self, user_id: UserId, item: CartItemRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // The cart row is created lazily on first add and never deleted.
        sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, product_name, quantity, unit_price_cents) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, product_id) DO UPDATE SET \
                 product_name = EXCLUDED.product_name, \
                 quantity = EXCLUDED.quantity, \
                 unit_price_cents = EXCLUDED.unit_price_cents",
        )
        .bind(user_id.as_uuid())
        .bind(item.product_id.as_str())
        .bind(&item.product_name)
        .bind(item.quantity as i32)
        .bind(item.unit_price.cents())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_cart_item(&self, user_id: UserId, product_id: &ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, user_id, status, total_cents, shipping_address_id, billing_address_id, created_at \
             FROM orders WHERE id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let header = Self::row_to_order_header(row)?;
                Ok(Some(self.load_order_parts(header).await?))
            }
            None => Ok(None),
        }
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT id, user_id, status, total_cents, shipping_address_id, billing_address_id, created_at \
             FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let header = Self::row_to_order_header(row)?;
            orders.push(self.load_order_parts(header).await?);
        }
        Ok(orders)
    }

    async fn commit_checkout(&self, writes: CheckoutWrites) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Guarded decrements first: a loser of a concurrent race aborts
        // here before anything else is written.
        for (product_id, qty) in &writes.stock_decrements {
            Self::apply_stock_delta(&mut tx, product_id, -i64::from(*qty)).await?;
        }

        if let Some(debit) = &writes.credit_debit {
            Self::apply_credit_movement(&mut tx, debit).await?;
        }

        let order = &writes.order;
        sqlx::query(
            "INSERT INTO orders (id, user_id, status, total_cents, shipping_address_id, billing_address_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total.cents())
        .bind(order.shipping_address_id.as_uuid())
        .bind(order.billing_address_id.as_uuid())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &writes.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price_cents, sale_percent_captured) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(order.id.as_uuid())
            .bind(item.product_id.as_str())
            .bind(&item.product_name)
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .bind(item.sale_percent_captured)
            .execute(&mut *tx)
            .await?;
        }

        let payment = &writes.payment;
        sqlx::query(
            "INSERT INTO payments (order_id, status, provider, amount_cents, transaction_id) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(payment.order_id.as_uuid())
        .bind(payment.status.as_str())
        .bind(payment.provider.as_str())
        .bind(payment.amount.cents())
        .bind(&payment.transaction_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(writes.clear_cart_for.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(order_id = %order.id, "checkout committed");
        Ok(())
    }

    async fn commit_cancellation(&self, writes: CancellationWrites) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Status guard: cancellation is one-way and one-time. A second
        // cancel (or a cancel racing a shipment) affects zero rows.
        let result = sqlx::query(
            "UPDATE orders SET status = 'CANCELLED' WHERE id = $1 AND status IN ('PENDING', 'PAID')",
        )
        .bind(writes.order_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                    .bind(writes.order_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match status {
                Some(status) => StoreError::OrderNotCancellable {
                    order_id: writes.order_id,
                    status: status.parse().map_err(StoreError::Decode)?,
                },
                None => StoreError::OrderNotFound(writes.order_id),
            });
        }

        for (product_id, qty) in &writes.stock_increments {
            Self::apply_stock_delta(&mut tx, product_id, i64::from(*qty)).await?;
        }

        if let Some(refund) = &writes.refund {
            Self::apply_credit_movement(&mut tx, refund).await?;
        }

        if let Some(status) = writes.payment_status {
            sqlx::query("UPDATE payments SET status = $2 WHERE order_id = $1")
                .bind(writes.order_id.as_uuid())
                .bind(status.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(order_id = %writes.order_id, "cancellation committed");
        Ok(())
    }
}
