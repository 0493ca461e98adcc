//! Market handlers: listing, books, tickers, trade history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{CreateMarketRequest, Market, MarketResolution, Outcome, TradeResponse};
use crate::services::coordinator::MarketSnapshot;
use crate::AppState;

use super::{error_response, trade_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct DepthQuery {
    pub depth: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MarketDetail {
    #[serde(flatten)]
    pub market: Market,
    pub resolution: Option<MarketResolution>,
}

#[derive(Debug, Serialize)]
pub struct OutcomeTicker {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub midpoint: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct TickerResponse {
    pub market_id: Uuid,
    pub yes: OutcomeTicker,
    pub no: OutcomeTicker,
}

/// Create a market (admin surface).
/// POST /admin/markets
pub async fn create_market(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMarketRequest>,
) -> Result<Json<Market>, ApiError> {
    if req.question.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "INVALID_QUESTION",
            "question must not be empty",
        ));
    }
    let market = state.coordinator.create_market(req.question, req.description);
    Ok(Json(market))
}

/// GET /markets
pub async fn list_markets(State(state): State<Arc<AppState>>) -> Json<Vec<Market>> {
    Json(state.coordinator.list_markets())
}

/// GET /markets/:market_id
pub async fn get_market(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
) -> Result<Json<MarketDetail>, ApiError> {
    let market = state.coordinator.market(market_id).ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            "MARKET_NOT_FOUND",
            format!("market {} not found", market_id),
        )
    })?;
    let resolution = state.coordinator.resolution(market_id);
    Ok(Json(MarketDetail { market, resolution }))
}

/// Aggregated per-outcome book levels.
/// GET /markets/:market_id/orderbook
pub async fn get_orderbook(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<MarketSnapshot>, ApiError> {
    let depth = query.depth.unwrap_or(20).clamp(1, 100);
    let snapshot = state
        .coordinator
        .snapshot(market_id, depth)
        .map_err(trade_error)?;
    Ok(Json(snapshot))
}

/// Best bid/ask/midpoint for both outcomes.
/// GET /markets/:market_id/ticker
pub async fn get_ticker(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
) -> Result<Json<TickerResponse>, ApiError> {
    let ticker = |outcome| -> Result<OutcomeTicker, ApiError> {
        let (best_bid, best_ask, midpoint) = state
            .coordinator
            .best_prices(market_id, outcome)
            .map_err(trade_error)?;
        Ok(OutcomeTicker {
            best_bid: best_bid.map(|p| p.normalize()),
            best_ask: best_ask.map(|p| p.normalize()),
            midpoint: midpoint.map(|p| p.normalize()),
        })
    };

    Ok(Json(TickerResponse {
        market_id,
        yes: ticker(Outcome::Yes)?,
        no: ticker(Outcome::No)?,
    }))
}

/// Recent trades, newest first.
/// GET /markets/:market_id/trades
pub async fn get_trades(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Query(query): Query<TradesQuery>,
) -> Result<Json<Vec<TradeResponse>>, ApiError> {
    if state.coordinator.market(market_id).is_none() {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            "MARKET_NOT_FOUND",
            format!("market {} not found", market_id),
        ));
    }
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let trades = state.coordinator.recent_trades(market_id, limit);
    Ok(Json(trades.iter().map(TradeResponse::from).collect()))
}
