//! Market and outcome models
//!
//! A market asks a yes/no question. Once resolved, each YES share pays 1 unit
//! of collateral if YES won (0 otherwise), and symmetrically for NO.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The two outcomes of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "outcome", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// The complementary outcome.
    pub fn complement(&self) -> Outcome {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Yes => "YES",
            Outcome::No => "NO",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "YES" => Ok(Outcome::Yes),
            "NO" => Ok(Outcome::No),
            _ => Err(format!("Invalid outcome: {}", s)),
        }
    }
}

/// Market lifecycle status.
///
/// `Resolved` and `Cancelled` are terminal and irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "market_status", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketStatus {
    Open,
    Resolved,
    Cancelled,
}

impl MarketStatus {
    /// Whether order placement and cancellation are still allowed.
    pub fn is_tradable(&self) -> bool {
        matches!(self, MarketStatus::Open)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MarketStatus::Resolved | MarketStatus::Cancelled)
    }
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MarketStatus::Open => "OPEN",
            MarketStatus::Resolved => "RESOLVED",
            MarketStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// A binary prediction market.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Market {
    /// Market unique id.
    pub id: Uuid,

    /// The yes/no question (e.g. "Will BTC close above $100k on Dec 31?").
    pub question: String,

    pub description: Option<String>,

    pub status: MarketStatus,

    pub created_at: DateTime<Utc>,

    /// Set when the market reaches a terminal state.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Market {
    pub fn new(question: String, description: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            question,
            description,
            status: MarketStatus::Open,
            created_at: now,
            closed_at: None,
        }
    }
}

/// Binds a resolved market to its winning outcome.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MarketResolution {
    pub market_id: Uuid,
    pub winning_outcome: Outcome,
    pub resolved_at: DateTime<Utc>,
    pub resolver_user_id: String,
}

/// Create market request (admin surface).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMarketRequest {
    pub question: String,
    pub description: Option<String>,
}
