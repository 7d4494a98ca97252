//! Checkout, cancellation and order lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{AddressId, OrderId};
use domain::{
    CartService, CheckoutRequest, CheckoutService, CreditService, InMemoryAddressBook,
    InMemoryAuditSink,
};
use serde::{Deserialize, Serialize};
use store::{CommerceStore, Order, PaymentMethod};

use crate::error::ApiError;
use crate::routes::AuthUser;

/// Shared application state accessible from all handlers.
pub struct AppState<S: CommerceStore + Clone> {
    pub checkout_service: CheckoutService<S, InMemoryAddressBook, InMemoryAuditSink>,
    pub cart_service: CartService<S>,
    pub credit_service: CreditService<S>,
    pub store: S,
}

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub shipping_address_id: AddressId,
    pub billing_address_id: Option<AddressId>,
    pub payment_method: PaymentMethod,
    #[serde(default = "default_same_address")]
    pub use_same_address_for_billing: bool,
}

fn default_same_address() -> bool {
    true
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub status: String,
    pub total_cents: i64,
    pub total: String,
    pub shipping_address_id: String,
    pub billing_address_id: String,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
    pub payment: PaymentResponse,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub sale_percent: Option<i32>,
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub status: String,
    pub provider: String,
    pub amount_cents: i64,
    pub transaction_id: Option<String>,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub success: bool,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        OrderResponse {
            id: order.header.id.to_string(),
            status: order.header.status.to_string(),
            total_cents: order.header.total.cents(),
            total: order.header.total.to_decimal_string(),
            shipping_address_id: order.header.shipping_address_id.to_string(),
            billing_address_id: order.header.billing_address_id.to_string(),
            created_at: order.header.created_at.to_rfc3339(),
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name,
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    sale_percent: item.sale_percent_captured,
                })
                .collect(),
            payment: PaymentResponse {
                status: order.payment.status.to_string(),
                provider: order.payment.provider.to_string(),
                amount_cents: order.payment.amount.cents(),
                transaction_id: order.payment.transaction_id,
            },
        }
    }
}

// -- Handlers --

/// POST /orders/checkout — place an order from the user's cart.
#[tracing::instrument(skip(state, req), fields(user_id = %user.0))]
pub async fn checkout<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .checkout_service
        .checkout(CheckoutRequest {
            user_id: user.0,
            shipping_address_id: req.shipping_address_id,
            billing_address_id: req.billing_address_id,
            payment_method: req.payment_method,
            use_same_address_for_billing: req.use_same_address_for_billing,
        })
        .await?;

    Ok((axum::http::StatusCode::CREATED, Json(order.into())))
}

/// POST /orders/:id/cancel — cancel an order, reversing its effects.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn cancel<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<CancelResponse>, ApiError> {
    state
        .checkout_service
        .cancel(user.0, OrderId::from_uuid(id))
        .await?;
    Ok(Json(CancelResponse { success: true }))
}

/// GET /orders/:id — load one of the user's orders.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn get<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = OrderId::from_uuid(id);
    let order = state
        .checkout_service
        .get_order(user.0, order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {order_id} not found")))?;
    Ok(Json(order.into()))
}

/// GET /orders — list the user's orders, newest first.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn list<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.checkout_service.list_orders(user.0).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}
