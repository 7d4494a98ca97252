//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{AddressId, Money, ProductId, UserId};
use domain::InMemoryAddressBook;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CommerceStore, MemoryCommerceStore, ProductRecord, UserRecord};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    store: MemoryCommerceStore,
    addresses: InMemoryAddressBook,
}

fn setup() -> TestApp {
    let store = MemoryCommerceStore::new();
    let (state, addresses) = api::create_default_state(store.clone());
    let app = api::create_app(state, get_metrics_handle());
    TestApp {
        app,
        store,
        addresses,
    }
}

impl TestApp {
    /// Seeds a user with a balance and one address.
    async fn seed_user(&self, balance_cents: i64) -> (UserId, AddressId) {
        let user_id = UserId::new();
        self.store
            .insert_user(UserRecord {
                id: user_id,
                credit_balance: Money::from_cents(balance_cents),
            })
            .await
            .unwrap();
        let address_id = self.addresses.add(user_id, "home");
        (user_id, address_id)
    }

    async fn seed_product(&self, sku: &str, price_cents: i64, stock: i64) {
        self.store
            .insert_product(ProductRecord {
                id: ProductId::new(sku),
                name: format!("Product {sku}"),
                price: Money::from_cents(price_cents),
                sale_percent: None,
                stock,
                is_active: true,
                deleted_at: None,
            })
            .await
            .unwrap();
    }

    async fn request(
        &self,
        method: &str,
        uri: &str,
        user_id: Option<UserId>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user_id {
            builder = builder.header("x-user-id", id.to_string());
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_string(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn add_to_cart(&self, user_id: UserId, sku: &str, quantity: u32) {
        let (status, _) = self
            .request(
                "POST",
                "/cart/items",
                Some(user_id),
                Some(serde_json::json!({ "product_id": sku, "quantity": quantity })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    async fn checkout(
        &self,
        user_id: UserId,
        address_id: AddressId,
        method: &str,
    ) -> (StatusCode, serde_json::Value) {
        self.request(
            "POST",
            "/orders/checkout",
            Some(user_id),
            Some(serde_json::json!({
                "shipping_address_id": address_id,
                "payment_method": method,
            })),
        )
        .await
    }
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();
    let (status, json) = t.request("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let t = setup();
    let (status, json) = t.request("GET", "/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_checkout_happy_path() {
    let t = setup();
    let (user_id, address_id) = t.seed_user(5000).await;
    t.seed_product("SKU-A", 1000, 5).await;
    t.add_to_cart(user_id, "SKU-A", 2).await;

    let (status, json) = t.checkout(user_id, address_id, "CREDIT").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "PAID");
    assert_eq!(json["total_cents"], 2000);
    assert_eq!(json["total"], "20.00");
    assert_eq!(json["payment"]["status"], "SUCCESS");
    assert_eq!(json["payment"]["provider"], "CREDIT");
    assert_eq!(json["items"][0]["product_id"], "SKU-A");
    assert_eq!(json["items"][0]["quantity"], 2);

    // The order is retrievable, the cart is empty, the balance debited.
    let order_id = json["id"].as_str().unwrap().to_string();
    let (status, json) = t
        .request("GET", &format!("/orders/{order_id}"), Some(user_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], order_id.as_str());

    let (_, cart) = t.request("GET", "/cart", Some(user_id), None).await;
    assert!(cart["items"].as_array().unwrap().is_empty());

    let (_, credit) = t.request("GET", "/credit", Some(user_id), None).await;
    assert_eq!(credit["balance_cents"], 3000);
}

#[tokio::test]
async fn test_checkout_empty_cart() {
    let t = setup();
    let (user_id, address_id) = t.seed_user(5000).await;

    let (status, json) = t.checkout(user_id, address_id, "CREDIT").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "EMPTY_CART");
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn test_checkout_unknown_address() {
    let t = setup();
    let (user_id, _) = t.seed_user(5000).await;
    t.seed_product("SKU-A", 1000, 5).await;
    t.add_to_cart(user_id, "SKU-A", 1).await;

    let (status, json) = t.checkout(user_id, AddressId::new(), "CREDIT").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "ADDRESS_NOT_FOUND");
}

#[tokio::test]
async fn test_checkout_insufficient_stock() {
    let t = setup();
    let (user_id, address_id) = t.seed_user(5000).await;
    t.seed_product("SKU-A", 1000, 2).await;
    t.add_to_cart(user_id, "SKU-A", 2).await;

    // A rival purchase drains the stock between add-to-cart and checkout.
    let (rival_id, rival_address) = t.seed_user(5000).await;
    t.add_to_cart(rival_id, "SKU-A", 2).await;
    let (status, _) = t.checkout(rival_id, rival_address, "CREDIT").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = t.checkout(user_id, address_id, "CREDIT").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INSUFFICIENT_STOCK");
}

#[tokio::test]
async fn test_checkout_insufficient_credit() {
    let t = setup();
    let (user_id, address_id) = t.seed_user(500).await;
    t.seed_product("SKU-A", 1000, 5).await;
    t.add_to_cart(user_id, "SKU-A", 1).await;

    let (status, json) = t.checkout(user_id, address_id, "CREDIT").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INSUFFICIENT_CREDIT");
}

#[tokio::test]
async fn test_cancel_order() {
    let t = setup();
    let (user_id, address_id) = t.seed_user(5000).await;
    t.seed_product("SKU-A", 1000, 5).await;
    t.add_to_cart(user_id, "SKU-A", 2).await;
    let (_, order) = t.checkout(user_id, address_id, "CREDIT").await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let (status, json) = t
        .request(
            "POST",
            &format!("/orders/{order_id}/cancel"),
            Some(user_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    // Refunded in full, order cancelled, second cancel rejected.
    let (_, credit) = t.request("GET", "/credit", Some(user_id), None).await;
    assert_eq!(credit["balance_cents"], 5000);

    let (_, reloaded) = t
        .request("GET", &format!("/orders/{order_id}"), Some(user_id), None)
        .await;
    assert_eq!(reloaded["status"], "CANCELLED");
    assert_eq!(reloaded["payment"]["status"], "FAILED");

    let (status, json) = t
        .request(
            "POST",
            &format!("/orders/{order_id}/cancel"),
            Some(user_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_cancel_unknown_order() {
    let t = setup();
    let (user_id, _) = t.seed_user(5000).await;

    let (status, json) = t
        .request(
            "POST",
            &format!("/orders/{}/cancel", uuid::Uuid::new_v4()),
            Some(user_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "ORDER_NOT_FOUND");
}

#[tokio::test]
async fn test_orders_are_user_scoped() {
    let t = setup();
    let (user_id, address_id) = t.seed_user(5000).await;
    t.seed_product("SKU-A", 1000, 5).await;
    t.add_to_cart(user_id, "SKU-A", 1).await;
    let (_, order) = t.checkout(user_id, address_id, "CREDIT").await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let (stranger_id, _) = t.seed_user(0).await;
    let (status, _) = t
        .request("GET", &format!("/orders/{order_id}"), Some(stranger_id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = t.request("GET", "/orders", Some(user_id), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    let (_, list) = t.request("GET", "/orders", Some(stranger_id), None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cart_update_and_remove() {
    let t = setup();
    let (user_id, _) = t.seed_user(0).await;
    t.seed_product("SKU-A", 1000, 10).await;
    t.add_to_cart(user_id, "SKU-A", 1).await;

    let (status, json) = t
        .request(
            "PUT",
            "/cart/items/SKU-A",
            Some(user_id),
            Some(serde_json::json!({ "quantity": 4 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"][0]["quantity"], 4);
    assert_eq!(json["total_cents"], 4000);

    let (status, json) = t
        .request("DELETE", "/cart/items/SKU-A", Some(user_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["items"].as_array().unwrap().is_empty());

    let (status, json) = t
        .request("DELETE", "/cart/items/SKU-A", Some(user_id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "CART_ITEM_NOT_FOUND");
}

#[tokio::test]
async fn test_cart_unknown_product() {
    let t = setup();
    let (user_id, _) = t.seed_user(0).await;

    let (status, json) = t
        .request(
            "POST",
            "/cart/items",
            Some(user_id),
            Some(serde_json::json!({ "product_id": "SKU-NONE", "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "PRODUCT_NOT_FOUND");
}

#[tokio::test]
async fn test_initial_bonus_is_one_time() {
    let t = setup();
    let (user_id, _) = t.seed_user(0).await;

    let (status, json) = t
        .request("POST", "/credit/initial-bonus", Some(user_id), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["balance_cents"], 10_000);

    let (status, json) = t
        .request("POST", "/credit/initial-bonus", Some(user_id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "BONUS_ALREADY_GRANTED");

    let (_, history) = t
        .request("GET", "/credit/history", Some(user_id), None)
        .await;
    let rows = history.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["kind"], "INITIAL_BONUS");
    assert_eq!(rows[0]["amount_cents"], 10_000);
}

#[tokio::test]
async fn test_credit_adjust() {
    let t = setup();
    let (user_id, _) = t.seed_user(1000).await;

    let (status, json) = t
        .request(
            "POST",
            "/credit/adjust",
            None,
            Some(serde_json::json!({
                "user_id": user_id,
                "amount_cents": 500,
                "note": "goodwill",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["balance_cents"], 1500);

    // A debit past the balance is rejected by the ledger guard.
    let (status, json) = t
        .request(
            "POST",
            "/credit/adjust",
            None,
            Some(serde_json::json!({
                "user_id": user_id,
                "amount_cents": -2000,
                "note": "chargeback",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INSUFFICIENT_CREDIT");
}
