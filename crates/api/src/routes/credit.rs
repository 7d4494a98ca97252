//! Credit balance and ledger endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::{Money, UserId};
use serde::{Deserialize, Serialize};
use store::{CommerceStore, CreditTransactionRecord};

use crate::error::ApiError;
use crate::routes::AuthUser;
use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct BalanceResponse {
    pub balance_cents: i64,
    pub balance: String,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub id: String,
    pub amount_cents: i64,
    pub kind: String,
    pub reference_id: Option<String>,
    pub note: String,
    pub created_at: String,
}

#[derive(Deserialize)]
pub struct AdjustRequest {
    pub user_id: UserId,
    pub amount_cents: i64,
    pub note: String,
}

impl From<Money> for BalanceResponse {
    fn from(balance: Money) -> Self {
        BalanceResponse {
            balance_cents: balance.cents(),
            balance: balance.to_decimal_string(),
        }
    }
}

impl From<CreditTransactionRecord> for TransactionResponse {
    fn from(row: CreditTransactionRecord) -> Self {
        TransactionResponse {
            id: row.id.to_string(),
            amount_cents: row.amount.cents(),
            kind: row.kind.to_string(),
            reference_id: row.reference_id.map(|id| id.to_string()),
            note: row.note,
            created_at: row.created_at.to_rfc3339(),
        }
    }
}

/// GET /credit — the user's materialized balance.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn balance<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.credit_service.balance(user.0).await?;
    Ok(Json(balance.into()))
}

/// GET /credit/history — ledger rows, oldest first.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn history<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    let rows = state.credit_service.history(user.0).await?;
    Ok(Json(rows.into_iter().map(TransactionResponse::from).collect()))
}

/// POST /credit/initial-bonus — one-time signup bonus.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn initial_bonus<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<(axum::http::StatusCode, Json<BalanceResponse>), ApiError> {
    let balance = state.credit_service.grant_initial_bonus(user.0).await?;
    Ok((axum::http::StatusCode::CREATED, Json(balance.into())))
}

/// POST /credit/adjust — signed administrative adjustment.
#[tracing::instrument(skip(state, req))]
pub async fn adjust<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state
        .credit_service
        .admin_adjust(req.user_id, Money::from_cents(req.amount_cents), req.note)
        .await?;
    Ok(Json(balance.into()))
}
