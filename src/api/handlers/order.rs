//! Order handlers: placement, lookup, cancellation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{OrderResponse, PlaceOrderRequest, TradeResponse};
use crate::AppState;

use super::{error_response, trade_error, ApiError};

#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub trades: Vec<TradeResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    pub user_id: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// The API-boundary price step. The core accepts any decimal in range; the
/// public surface quotes in cents.
fn on_price_step(price: Decimal) -> bool {
    (price * Decimal::from(100)).fract().is_zero()
}

/// Place an order.
/// POST /orders
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<Json<PlaceOrderResponse>, ApiError> {
    if !on_price_step(req.price) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "INVALID_PRICE",
            format!("price {} is not a multiple of 0.01", req.price),
        ));
    }

    let result = state
        .coordinator
        .place_order(
            &req.user_id,
            req.market_id,
            req.outcome,
            req.side,
            req.price,
            req.quantity,
        )
        .map_err(trade_error)?;

    Ok(Json(PlaceOrderResponse {
        order: OrderResponse::from(result.order),
        trades: result.trades.iter().map(TradeResponse::from).collect(),
    }))
}

/// Fetch one order.
/// GET /orders/:order_id
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    match state.coordinator.order(order_id) {
        Some(order) => Ok(Json(OrderResponse::from(order))),
        None => Err(error_response(
            StatusCode::NOT_FOUND,
            "ORDER_NOT_FOUND",
            format!("order {} not found", order_id),
        )),
    }
}

/// Cancel an order.
/// DELETE /orders/:order_id
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let cancelled = state
        .coordinator
        .cancel_order(&req.user_id, order_id, req.is_admin)
        .map_err(trade_error)?;

    Ok(Json(OrderResponse::from(cancelled)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_step() {
        assert!(on_price_step(dec!(0.55)));
        assert!(on_price_step(dec!(0.01)));
        assert!(on_price_step(dec!(0.50)));
        assert!(!on_price_step(dec!(0.555)));
        assert!(!on_price_step(dec!(0.001)));
    }
}
