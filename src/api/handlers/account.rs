//! Account handlers: portfolio and ledger history.

use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::models::{LedgerEntry, OrderResponse, Outcome};
use crate::AppState;

use super::ApiError;

#[derive(Debug, Serialize)]
pub struct BalanceView {
    pub available: Decimal,
    pub reserved: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PositionView {
    pub market_id: uuid::Uuid,
    pub outcome: Outcome,
    pub shares: Decimal,
    pub reserved_shares: Decimal,
    pub avg_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PortfolioResponse {
    pub user_id: String,
    pub balance: BalanceView,
    pub positions: Vec<PositionView>,
    pub open_orders: Vec<OrderResponse>,
}

/// Balance + positions + open orders.
/// GET /account/:user_id/portfolio
pub async fn get_portfolio(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<PortfolioResponse>, ApiError> {
    let portfolio = state.coordinator.portfolio(&user_id);

    Ok(Json(PortfolioResponse {
        user_id: portfolio.user_id,
        balance: BalanceView {
            available: portfolio.balance.available.normalize(),
            reserved: portfolio.balance.reserved.normalize(),
        },
        positions: portfolio
            .positions
            .into_iter()
            .map(|p| PositionView {
                market_id: p.market_id,
                outcome: p.outcome,
                shares: p.shares.normalize(),
                reserved_shares: p.reserved_shares.normalize(),
                avg_price: p.avg_price.normalize(),
            })
            .collect(),
        open_orders: portfolio
            .open_orders
            .into_iter()
            .map(OrderResponse::from)
            .collect(),
    }))
}

/// Ledger entries, oldest first.
/// GET /account/:user_id/ledger
pub async fn get_ledger(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    Ok(Json(state.coordinator.ledger().entries_for(&user_id)))
}
