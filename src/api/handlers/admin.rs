//! Admin handlers: market lifecycle and balance adjustments.
//!
//! Authentication lives in the hosting layer; these routes are mounted on
//! the admin surface and carry the acting admin's id for the audit trail.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{LedgerReason, Outcome};
use crate::AppState;

use super::{error_response, trade_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct ResolveMarketRequest {
    pub admin_user_id: String,
    pub winner: String,
}

#[derive(Debug, Serialize)]
pub struct ResolveMarketResponse {
    pub market_id: Uuid,
    pub winner: Outcome,
    pub positions_settled: usize,
}

#[derive(Debug, Deserialize)]
pub struct CancelMarketRequest {
    pub admin_user_id: String,
}

#[derive(Debug, Serialize)]
pub struct CancelMarketResponse {
    pub market_id: Uuid,
    pub orders_refunded: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    pub user_id: String,
    pub amount: Decimal,
    /// "faucet" (default) or "adjustment".
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreditResponse {
    pub user_id: String,
    pub available: Decimal,
    pub reserved: Decimal,
}

/// Resolve a market to a winning outcome.
/// POST /admin/markets/:market_id/resolve
pub async fn resolve_market(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Json(req): Json<ResolveMarketRequest>,
) -> Result<Json<ResolveMarketResponse>, ApiError> {
    let winner: Outcome = req.winner.parse().map_err(|_| {
        error_response(
            StatusCode::BAD_REQUEST,
            "INVALID_OUTCOME",
            format!("invalid outcome: {}", req.winner),
        )
    })?;

    let positions_settled = state
        .coordinator
        .resolve_market(&req.admin_user_id, market_id, winner)
        .map_err(trade_error)?;

    Ok(Json(ResolveMarketResponse {
        market_id,
        winner,
        positions_settled,
    }))
}

/// Cancel a market and refund every reservation.
/// POST /admin/markets/:market_id/cancel
pub async fn cancel_market(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Json(req): Json<CancelMarketRequest>,
) -> Result<Json<CancelMarketResponse>, ApiError> {
    tracing::info!(admin = %req.admin_user_id, market = %market_id, "market cancel requested");
    let orders_refunded = state
        .coordinator
        .cancel_market(market_id)
        .map_err(trade_error)?;

    Ok(Json(CancelMarketResponse {
        market_id,
        orders_refunded,
    }))
}

/// Credit or adjust a user's balance.
/// POST /admin/credit
pub async fn credit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreditRequest>,
) -> Result<Json<CreditResponse>, ApiError> {
    let reason = match req.kind.as_deref() {
        None | Some("faucet") => LedgerReason::FaucetCredit,
        Some("adjustment") => LedgerReason::AdminAdjustment,
        Some(other) => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "INVALID_CREDIT_KIND",
                format!("invalid credit kind: {}", other),
            ))
        }
    };
    if reason == LedgerReason::FaucetCredit && req.amount <= Decimal::ZERO {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "INVALID_AMOUNT",
            "faucet credit must be positive",
        ));
    }

    state
        .coordinator
        .credit(&req.user_id, req.amount, reason)
        .map_err(trade_error)?;

    let balance = state.coordinator.ledger().balance(&req.user_id);
    Ok(Json(CreditResponse {
        user_id: req.user_id,
        available: balance.available.normalize(),
        reserved: balance.reserved.normalize(),
    }))
}
