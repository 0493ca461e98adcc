//! Write-behind persistence
//!
//! The coordinator commits events in memory, then ships the touched rows
//! here. The worker writes each event in a single transaction so readers of
//! the store never observe a half-applied event, retrying transient failures
//! a bounded number of times. Recovery loaders read the projections back at
//! startup.

use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::models::{
    Balance, LedgerEntry, Market, MarketResolution, Order, OrderStatus, Position, Trade,
};

const MAX_WRITE_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Rows touched by one committed event.
#[derive(Debug, Clone, Default)]
pub struct CommittedEvent {
    pub orders: Vec<Order>,
    pub trades: Vec<Trade>,
    pub entries: Vec<LedgerEntry>,
    pub balances: Vec<(String, Balance)>,
    pub positions: Vec<Position>,
    pub markets: Vec<Market>,
    pub resolutions: Vec<MarketResolution>,
}

#[derive(Debug)]
pub enum PersistRequest {
    Commit(Box<CommittedEvent>),
}

/// Start the persistence worker. Returns the sender handed to the
/// coordinator and the worker handle.
pub fn start_worker(
    pool: PgPool,
    buffer: usize,
) -> (mpsc::Sender<PersistRequest>, tokio::task::JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel(buffer);

    let handle = tokio::spawn(async move {
        info!("persistence worker started");
        while let Some(PersistRequest::Commit(event)) = receiver.recv().await {
            let mut attempt = 1;
            loop {
                match write_event(&pool, &event).await {
                    Ok(()) => {
                        debug!(
                            orders = event.orders.len(),
                            trades = event.trades.len(),
                            entries = event.entries.len(),
                            "event persisted"
                        );
                        break;
                    }
                    Err(e) if attempt < MAX_WRITE_ATTEMPTS && is_transient(&e) => {
                        warn!(attempt, error = %e, "transient persistence failure, retrying");
                        attempt += 1;
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    }
                    Err(e) => {
                        error!(error = %e, "failed to persist event");
                        break;
                    }
                }
            }
        }
        info!("persistence worker stopped");
    });

    (sender, handle)
}

fn is_transient(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => {
            // Serialization failure / deadlock detected.
            matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}

/// Write every row of one event inside a single transaction.
async fn write_event(pool: &PgPool, event: &CommittedEvent) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for market in &event.markets {
        upsert_market(&mut tx, market).await?;
    }
    for order in &event.orders {
        upsert_order(&mut tx, order).await?;
    }
    for trade in &event.trades {
        insert_trade(&mut tx, trade).await?;
    }
    for entry in &event.entries {
        insert_entry(&mut tx, entry).await?;
    }
    for (user_id, balance) in &event.balances {
        upsert_balance(&mut tx, user_id, balance).await?;
    }
    for position in &event.positions {
        upsert_position(&mut tx, position).await?;
    }
    for resolution in &event.resolutions {
        insert_resolution(&mut tx, resolution).await?;
    }

    tx.commit().await
}

async fn upsert_market(
    tx: &mut Transaction<'_, Postgres>,
    market: &Market,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO markets (id, question, description, status, created_at, closed_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE SET status = $4, closed_at = $6
        "#,
    )
    .bind(market.id)
    .bind(&market.question)
    .bind(&market.description)
    .bind(market.status)
    .bind(market.created_at)
    .bind(market.closed_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, user_id, market_id, outcome, side, price, quantity, remaining, status, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET remaining = $8, status = $9
        "#,
    )
    .bind(order.id)
    .bind(&order.user_id)
    .bind(order.market_id)
    .bind(order.outcome)
    .bind(order.side)
    .bind(order.price)
    .bind(order.quantity)
    .bind(order.remaining)
    .bind(order.status)
    .bind(order.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_trade(tx: &mut Transaction<'_, Postgres>, trade: &Trade) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO trades (
            id, market_id, outcome, price, quantity,
            maker_order_id, taker_order_id, maker_user_id, taker_user_id,
            taker_side, taker_fee, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(trade.id)
    .bind(trade.market_id)
    .bind(trade.outcome)
    .bind(trade.price)
    .bind(trade.quantity)
    .bind(trade.maker_order_id)
    .bind(trade.taker_order_id)
    .bind(&trade.maker_user_id)
    .bind(&trade.taker_user_id)
    .bind(trade.taker_side)
    .bind(trade.taker_fee)
    .bind(trade.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_entry(
    tx: &mut Transaction<'_, Postgres>,
    entry: &LedgerEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO ledger_entries (
            id, user_id, delta_available, delta_reserved, reason, ref_type, ref_id, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(entry.id)
    .bind(&entry.user_id)
    .bind(entry.delta_available)
    .bind(entry.delta_reserved)
    .bind(entry.reason)
    .bind(entry.ref_type)
    .bind(entry.ref_id)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_balance(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    balance: &Balance,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO balances (user_id, available, reserved)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO UPDATE SET available = $2, reserved = $3
        "#,
    )
    .bind(user_id)
    .bind(balance.available)
    .bind(balance.reserved)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_position(
    tx: &mut Transaction<'_, Postgres>,
    position: &Position,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO positions (user_id, market_id, outcome, shares, reserved_shares, avg_price)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id, market_id, outcome)
        DO UPDATE SET shares = $4, reserved_shares = $5, avg_price = $6
        "#,
    )
    .bind(&position.user_id)
    .bind(position.market_id)
    .bind(position.outcome)
    .bind(position.shares)
    .bind(position.reserved_shares)
    .bind(position.avg_price)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_resolution(
    tx: &mut Transaction<'_, Postgres>,
    resolution: &MarketResolution,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO market_resolutions (market_id, winning_outcome, resolved_at, resolver_user_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (market_id) DO NOTHING
        "#,
    )
    .bind(resolution.market_id)
    .bind(resolution.winning_outcome)
    .bind(resolution.resolved_at)
    .bind(&resolution.resolver_user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// ============================================================================
// Recovery loaders
// ============================================================================

pub async fn load_balances(pool: &PgPool) -> Result<Vec<(String, Balance)>, sqlx::Error> {
    let rows: Vec<(String, Balance)> =
        sqlx::query_as::<_, (String, rust_decimal::Decimal, rust_decimal::Decimal)>(
            "SELECT user_id, available, reserved FROM balances",
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|(user_id, available, reserved)| (user_id, Balance { available, reserved }))
        .collect();
    Ok(rows)
}

pub async fn load_positions(pool: &PgPool) -> Result<Vec<Position>, sqlx::Error> {
    sqlx::query_as::<_, Position>(
        "SELECT user_id, market_id, outcome, shares, reserved_shares, avg_price FROM positions",
    )
    .fetch_all(pool)
    .await
}

pub async fn load_markets(pool: &PgPool) -> Result<Vec<Market>, sqlx::Error> {
    sqlx::query_as::<_, Market>(
        "SELECT id, question, description, status, created_at, closed_at FROM markets",
    )
    .fetch_all(pool)
    .await
}

pub async fn load_resolutions(pool: &PgPool) -> Result<Vec<MarketResolution>, sqlx::Error> {
    sqlx::query_as::<_, MarketResolution>(
        "SELECT market_id, winning_outcome, resolved_at, resolver_user_id FROM market_resolutions",
    )
    .fetch_all(pool)
    .await
}

/// Open and partially filled orders in ascending creation order, the replay
/// order for book recovery.
pub async fn load_open_orders(pool: &PgPool) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT id, user_id, market_id, outcome, side, price, quantity, remaining, status, created_at
        FROM orders
        WHERE status IN ($1, $2)
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(OrderStatus::Open)
    .bind(OrderStatus::Partial)
    .fetch_all(pool)
    .await
}

pub async fn max_ledger_entry_id(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(id), 0) FROM ledger_entries")
        .fetch_one(pool)
        .await
}
