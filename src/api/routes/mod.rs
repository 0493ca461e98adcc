use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::AppState;

pub fn create_router(_state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes
    let public_routes = Router::new()
        // Markets
        .route("/markets", get(handlers::market::list_markets))
        .route("/markets/:market_id", get(handlers::market::get_market))
        .route("/markets/:market_id/orderbook", get(handlers::market::get_orderbook))
        .route("/markets/:market_id/ticker", get(handlers::market::get_ticker))
        .route("/markets/:market_id/trades", get(handlers::market::get_trades))
        // Orders
        .route("/orders", post(handlers::order::create_order))
        .route("/orders/:order_id", get(handlers::order::get_order))
        .route("/orders/:order_id", delete(handlers::order::cancel_order))
        // Account
        .route("/account/:user_id/portfolio", get(handlers::account::get_portfolio))
        .route("/account/:user_id/ledger", get(handlers::account::get_ledger));

    // Admin routes; the hosting deployment gates access to this surface.
    let admin_routes = Router::new()
        .route("/admin/markets", post(handlers::market::create_market))
        .route("/admin/markets/:market_id/resolve", post(handlers::admin::resolve_market))
        .route("/admin/markets/:market_id/cancel", post(handlers::admin::cancel_market))
        .route("/admin/credit", post(handlers::admin::credit));

    Router::new().merge(public_routes).merge(admin_routes)
}
