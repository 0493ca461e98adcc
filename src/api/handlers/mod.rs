//! HTTP handlers
//!
//! Thin adapters over the trading coordinator. Business errors map to
//! 4xx-class responses with stable codes; invariant violations map to a
//! generic internal error with details kept in the logs.

pub mod account;
pub mod admin;
pub mod market;
pub mod order;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::services::TradeError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

pub fn trade_error(e: TradeError) -> ApiError {
    use TradeError::*;
    match &e {
        MarketNotFound(_) => error_response(StatusCode::NOT_FOUND, "MARKET_NOT_FOUND", e.to_string()),
        OrderNotFound(_) => error_response(StatusCode::NOT_FOUND, "ORDER_NOT_FOUND", e.to_string()),
        UnknownAccount(_) => error_response(StatusCode::NOT_FOUND, "UNKNOWN_ACCOUNT", e.to_string()),
        NotOwner => error_response(StatusCode::FORBIDDEN, "NOT_OWNER", e.to_string()),
        NotCancellable => error_response(StatusCode::BAD_REQUEST, "NOT_CANCELLABLE", e.to_string()),
        MarketClosed(_) => error_response(StatusCode::BAD_REQUEST, "MARKET_NOT_OPEN", e.to_string()),
        InvalidPrice(_) => error_response(StatusCode::BAD_REQUEST, "INVALID_PRICE", e.to_string()),
        InvalidQuantity(_) => {
            error_response(StatusCode::BAD_REQUEST, "INVALID_QUANTITY", e.to_string())
        }
        InvalidOutcome(_) => error_response(StatusCode::BAD_REQUEST, "INVALID_OUTCOME", e.to_string()),
        InsufficientFunds { .. } => {
            error_response(StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS", e.to_string())
        }
        InsufficientShares { .. } => {
            error_response(StatusCode::BAD_REQUEST, "INSUFFICIENT_SHARES", e.to_string())
        }
        Invariant(_) => {
            tracing::error!(error = %e, "invariant violation surfaced to API");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal error",
            )
        }
    }
}
