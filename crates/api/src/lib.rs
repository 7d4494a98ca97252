//! HTTP API server with observability for the storefront.
//!
//! Exposes checkout, cancellation, order lookup, cart and credit
//! endpoints, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use domain::{CartService, CheckoutService, CreditService, InMemoryAddressBook, InMemoryAuditSink};
use metrics_exporter_prometheus::PrometheusHandle;
use store::CommerceStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: CommerceStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders/checkout", post(routes::orders::checkout::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::update_item::<S>),
        )
        .route(
            "/cart/items/{product_id}",
            delete(routes::cart::remove_item::<S>),
        )
        .route("/credit", get(routes::credit::balance::<S>))
        .route("/credit/history", get(routes::credit::history::<S>))
        .route("/credit/initial-bonus", post(routes::credit::initial_bonus::<S>))
        .route("/credit/adjust", post(routes::credit::adjust::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state around a store.
///
/// The address book is also returned so callers (tests, seeding) can
/// register addresses for users.
pub fn create_default_state<S: CommerceStore + Clone + 'static>(
    store: S,
) -> (Arc<AppState<S>>, InMemoryAddressBook) {
    let addresses = InMemoryAddressBook::new();
    let audit = Arc::new(InMemoryAuditSink::new());

    let state = Arc::new(AppState {
        checkout_service: CheckoutService::new(store.clone(), addresses.clone(), audit),
        cart_service: CartService::new(store.clone()),
        credit_service: CreditService::new(store.clone()),
        store,
    });

    (state, addresses)
}
