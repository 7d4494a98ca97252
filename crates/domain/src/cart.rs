//! Cart service: line mutations with price capture.
//!
//! The unit price on a cart line is captured from the product's current
//! price and sale discount when the line is added or its quantity is
//! updated. Checkout charges the captured price exclusively; later
//! catalog changes never reach an existing line.

use common::{ProductId, UserId};
use store::{Cart, CartItemRecord, CommerceStore, ProductRecord};

use crate::error::CartError;

/// Service for cart line operations.
pub struct CartService<S> {
    store: S,
}

impl<S: CommerceStore> CartService<S> {
    /// Creates a new cart service on the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds a product to the user's cart, capturing the current
    /// sale-discounted price. Adding a product already in the cart merges
    /// the quantities and re-captures the price.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }
        let product = self.purchasable_product(&product_id).await?;

        let existing_quantity = self
            .store
            .get_cart(user_id)
            .await?
            .items
            .iter()
            .find(|i| i.product_id == product_id)
            .map(|i| i.quantity)
            .unwrap_or(0);

        self.store
            .upsert_cart_item(user_id, captured_line(&product, existing_quantity + quantity))
            .await?;
        Ok(self.store.get_cart(user_id).await?)
    }

    /// Sets the quantity of an existing line, re-capturing the current
    /// price. Quantity zero removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, CartError> {
        let cart = self.store.get_cart(user_id).await?;
        if !cart.items.iter().any(|i| i.product_id == product_id) {
            return Err(CartError::ItemNotFound(product_id));
        }

        if quantity == 0 {
            self.store.remove_cart_item(user_id, &product_id).await?;
        } else {
            let product = self.purchasable_product(&product_id).await?;
            self.store
                .upsert_cart_item(user_id, captured_line(&product, quantity))
                .await?;
        }
        Ok(self.store.get_cart(user_id).await?)
    }

    /// Removes a line from the cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Cart, CartError> {
        if !self.store.remove_cart_item(user_id, &product_id).await? {
            return Err(CartError::ItemNotFound(product_id));
        }
        Ok(self.store.get_cart(user_id).await?)
    }

    /// Returns the user's cart.
    pub async fn get(&self, user_id: UserId) -> Result<Cart, CartError> {
        Ok(self.store.get_cart(user_id).await?)
    }

    async fn purchasable_product(&self, product_id: &ProductId) -> Result<ProductRecord, CartError> {
        let product = self
            .store
            .find_product(product_id)
            .await?
            .ok_or_else(|| CartError::ProductNotFound(product_id.clone()))?;
        if !product.is_purchasable() {
            return Err(CartError::ProductUnavailable(product_id.clone()));
        }
        Ok(product)
    }
}

fn captured_line(product: &ProductRecord, quantity: u32) -> CartItemRecord {
    CartItemRecord {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        quantity,
        unit_price: product.sale_price(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::Money;
    use store::MemoryCommerceStore;

    use super::*;

    async fn setup(price_cents: i64, sale_percent: Option<i32>) -> (CartService<MemoryCommerceStore>, MemoryCommerceStore, UserId) {
        let store = MemoryCommerceStore::new();
        store
            .insert_product(ProductRecord {
                id: ProductId::new("SKU-001"),
                name: "Widget".to_string(),
                price: Money::from_cents(price_cents),
                sale_percent,
                stock: 10,
                is_active: true,
                deleted_at: None,
            })
            .await
            .unwrap();
        (CartService::new(store.clone()), store, UserId::new())
    }

    #[tokio::test]
    async fn add_item_captures_sale_price() {
        let (service, _, user_id) = setup(1000, Some(20)).await;

        let cart = service
            .add_item(user_id, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].unit_price.cents(), 800);
        assert_eq!(cart.total_amount().cents(), 1600);
    }

    #[tokio::test]
    async fn add_same_item_merges_quantities() {
        let (service, _, user_id) = setup(1000, None).await;

        service
            .add_item(user_id, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();
        let cart = service
            .add_item(user_id, ProductId::new("SKU-001"), 3)
            .await
            .unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);
    }

    #[tokio::test]
    async fn price_change_leaves_existing_line_untouched() {
        let (service, store, user_id) = setup(1000, None).await;

        service
            .add_item(user_id, ProductId::new("SKU-001"), 1)
            .await
            .unwrap();
        store
            .set_price(&ProductId::new("SKU-001"), Money::from_cents(2500), None)
            .await
            .unwrap();

        let cart = service.get(user_id).await.unwrap();
        assert_eq!(cart.items[0].unit_price.cents(), 1000);
    }

    #[tokio::test]
    async fn update_quantity_recaptures_price() {
        let (service, store, user_id) = setup(1000, None).await;

        service
            .add_item(user_id, ProductId::new("SKU-001"), 1)
            .await
            .unwrap();
        store
            .set_price(&ProductId::new("SKU-001"), Money::from_cents(2500), None)
            .await
            .unwrap();

        let cart = service
            .update_quantity(user_id, ProductId::new("SKU-001"), 3)
            .await
            .unwrap();
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(cart.items[0].unit_price.cents(), 2500);
    }

    #[tokio::test]
    async fn update_quantity_to_zero_removes_line() {
        let (service, _, user_id) = setup(1000, None).await;

        service
            .add_item(user_id, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();
        let cart = service
            .update_quantity(user_id, ProductId::new("SKU-001"), 0)
            .await
            .unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn missing_line_update_fails() {
        let (service, _, user_id) = setup(1000, None).await;
        let result = service
            .update_quantity(user_id, ProductId::new("SKU-001"), 2)
            .await;
        assert!(matches!(result, Err(CartError::ItemNotFound(_))));
    }

    #[tokio::test]
    async fn zero_quantity_add_fails() {
        let (service, _, user_id) = setup(1000, None).await;
        let result = service.add_item(user_id, ProductId::new("SKU-001"), 0).await;
        assert!(matches!(result, Err(CartError::InvalidQuantity { .. })));
    }

    #[tokio::test]
    async fn unknown_product_fails() {
        let (service, _, user_id) = setup(1000, None).await;
        let result = service.add_item(user_id, ProductId::new("SKU-404"), 1).await;
        assert!(matches!(result, Err(CartError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn soft_deleted_product_cannot_be_added() {
        let store = MemoryCommerceStore::new();
        store
            .insert_product(ProductRecord {
                id: ProductId::new("SKU-001"),
                name: "Widget".to_string(),
                price: Money::from_cents(1000),
                sale_percent: None,
                stock: 10,
                is_active: true,
                deleted_at: Some(Utc::now()),
            })
            .await
            .unwrap();
        let service = CartService::new(store);

        let result = service
            .add_item(UserId::new(), ProductId::new("SKU-001"), 1)
            .await;
        assert!(matches!(result, Err(CartError::ProductUnavailable(_))));
    }
}
