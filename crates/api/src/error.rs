//! API error types with HTTP response mapping.
//!
//! Error bodies have a fixed shape: `{"success": false, "message": ...,
//! "code": ...}`. The `code` is a stable machine-readable token;
//! `message` is human-readable and may change.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, CheckoutError, CreditError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed `X-User-Id` header.
    Unauthorized,
    /// Bad request from the client.
    BadRequest(String),
    /// Resource not found.
    NotFound(String),
    /// Checkout or cancellation error.
    Checkout(CheckoutError),
    /// Cart operation error.
    Cart(CartError),
    /// Credit ledger error.
    Credit(CreditError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "missing or invalid X-User-Id header".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Cart(err) => cart_error_to_response(err),
            ApiError::Credit(err) => credit_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = serde_json::json!({
            "success": false,
            "message": message,
            "code": code,
        });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, "EMPTY_CART", message),
        CheckoutError::AddressNotFound => {
            (StatusCode::NOT_FOUND, "ADDRESS_NOT_FOUND", message)
        }
        CheckoutError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND", message),
        CheckoutError::InsufficientCredit { .. } => {
            (StatusCode::CONFLICT, "INSUFFICIENT_CREDIT", message)
        }
        CheckoutError::InsufficientStock { .. } => {
            (StatusCode::CONFLICT, "INSUFFICIENT_STOCK", message)
        }
        CheckoutError::InvalidStateTransition { .. } => {
            (StatusCode::CONFLICT, "INVALID_STATE", message)
        }
        CheckoutError::TransactionFailed(_) => {
            tracing::error!(error = %message, "checkout transaction failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "TRANSACTION_FAILED", message)
        }
    }
}

fn cart_error_to_response(err: CartError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        CartError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND", message),
        CartError::ProductUnavailable(_) => {
            (StatusCode::CONFLICT, "PRODUCT_UNAVAILABLE", message)
        }
        CartError::InvalidQuantity { .. } => {
            (StatusCode::BAD_REQUEST, "INVALID_QUANTITY", message)
        }
        CartError::ItemNotFound(_) => (StatusCode::NOT_FOUND, "CART_ITEM_NOT_FOUND", message),
        CartError::Store(_) => {
            tracing::error!(error = %message, "cart store error");
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
        }
    }
}

fn credit_error_to_response(err: CreditError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        CreditError::BonusAlreadyGranted(_) => {
            (StatusCode::CONFLICT, "BONUS_ALREADY_GRANTED", message)
        }
        CreditError::InsufficientCredit { .. } => {
            (StatusCode::CONFLICT, "INSUFFICIENT_CREDIT", message)
        }
        CreditError::ZeroAmount => (StatusCode::BAD_REQUEST, "ZERO_AMOUNT", message),
        CreditError::UserNotFound(_) => (StatusCode::NOT_FOUND, "USER_NOT_FOUND", message),
        CreditError::Store(_) => {
            tracing::error!(error = %message, "credit store error");
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<CreditError> for ApiError {
    fn from(err: CreditError) -> Self {
        ApiError::Credit(err)
    }
}
