use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod db;
mod models;
mod services;

use crate::config::AppConfig;
use crate::db::Database;
use crate::services::coordinator::persist;
use crate::services::TradingCoordinator;

pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub coordinator: Arc<TradingCoordinator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outcome_exchange=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting Outcome Exchange v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.environment);

    // Initialize database
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connected");

    // Start the write-behind persistence worker
    let (persist_sender, _persist_handle) =
        persist::start_worker(db.pool.clone(), config.persist_queue_size);

    // Rebuild the trading core from the persisted projections
    let coordinator =
        TradingCoordinator::new(config.trading()).with_persistence(persist_sender);

    let markets = persist::load_markets(&db.pool).await?;
    let resolutions = persist::load_resolutions(&db.pool).await?;
    let balances = persist::load_balances(&db.pool).await?;
    let positions = persist::load_positions(&db.pool).await?;
    let open_orders = persist::load_open_orders(&db.pool).await?;
    let max_entry_id = persist::max_ledger_entry_id(&db.pool).await?;

    let replayed = coordinator
        .restore(markets, resolutions, balances, positions, open_orders, max_entry_id)
        .map_err(|e| anyhow::anyhow!("startup recovery failed: {}", e))?;
    if replayed > 0 {
        tracing::info!("Recovered {} open orders into the books", replayed);
    } else {
        tracing::info!("No open orders to recover");
    }

    let coordinator = Arc::new(coordinator);

    // Build application state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        coordinator,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api::routes::create_router(state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
