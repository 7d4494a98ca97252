//! Cart CRUD endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use serde::{Deserialize, Serialize};
use store::{Cart, CommerceStore};

use crate::error::ApiError;
use crate::routes::AuthUser;
use crate::routes::orders::AppState;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartItemResponse>,
    pub total_cents: i64,
    pub total: String,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        let total = cart.total_amount();
        CartResponse {
            items: cart
                .items
                .into_iter()
                .map(|item| CartItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    line_total_cents: item.line_total().cents(),
                })
                .collect(),
            total_cents: total.cents(),
            total: total.to_decimal_string(),
        }
    }
}

/// GET /cart — the user's cart with captured prices.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn get<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.cart_service.get(user.0).await?;
    Ok(Json(cart.into()))
}

/// POST /cart/items — add a product, merging quantities.
#[tracing::instrument(skip(state, req), fields(user_id = %user.0))]
pub async fn add_item<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Json(req): Json<AddItemRequest>,
) -> Result<(axum::http::StatusCode, Json<CartResponse>), ApiError> {
    let cart = state
        .cart_service
        .add_item(user.0, ProductId::new(req.product_id), req.quantity)
        .await?;
    Ok((axum::http::StatusCode::CREATED, Json(cart.into())))
}

/// PUT /cart/items/:product_id — set a line's quantity; zero removes it.
#[tracing::instrument(skip(state, req), fields(user_id = %user.0))]
pub async fn update_item<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(product_id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .cart_service
        .update_quantity(user.0, ProductId::new(product_id), req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/items/:product_id — remove a line.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn remove_item<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(product_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .cart_service
        .remove_item(user.0, ProductId::new(product_id))
        .await?;
    Ok(Json(cart.into()))
}
