// Data models for the bounty prediction market

use serde::{Deserialize, Serialize};

/// Stablecoin amount in the token's smallest unit (USDC: 6 decimals)
pub type Amount = u64;

/// Unix timestamp in seconds
pub type Timestamp = u64;

pub type MarketId = u64;

/// Sequential per market, starting at 1
pub type StakeId = u64;

/// Smallest units per whole token (USDC has 6 decimals)
pub const TOKEN_UNIT: Amount = 1_000_000;

// ============================================================================
// SIDES & STATUS
// ============================================================================

/// Which outcome a stake backs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn from_bool(yes: bool) -> Self {
        if yes { Side::Yes } else { Side::No }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "yes" | "true" | "y" => Some(Side::Yes),
            "no" | "false" | "n" => Some(Side::No),
            _ => None,
        }
    }
}

/// Market lifecycle status
///
/// Flow: Active → Closed → Resolved
///
/// Only `Active` and `Resolved` are ever stored. `Closed` is derived from the
/// clock (`now >= deadline`) by `lifecycle::phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    /// Accepting stakes until the deadline
    Active,
    /// Deadline passed, awaiting admin resolution
    Closed,
    /// Settled, terminal
    Resolved,
}

impl MarketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketStatus::Active => "active",
            MarketStatus::Closed => "closed",
            MarketStatus::Resolved => "resolved",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MarketStatus::Resolved)
    }
}

// ============================================================================
// MARKET & STAKE
// ============================================================================

/// Outcome of settlement, kept on the market for audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSummary {
    /// Number of winning stakes that received a payout
    pub winning_stakes: u64,
    /// Sum of all winning payouts
    pub winnings_paid: Amount,
    /// Bounty transferred to the verified claimant
    pub bounty_paid: Amount,
    /// Value left in escrow: rounding dust, a one-sided pool, an unclaimed bounty
    pub unclaimed: Amount,
    pub resolved_at: Timestamp,
}

/// A single yes/no question with its three pools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub question: String,
    pub description: String,
    pub creator: String,

    /// No stakes accepted at or after this instant
    pub deadline: Timestamp,

    /// Expected resolution instant (informational)
    pub resolution_date: Timestamp,

    /// Net-of-fee YES stakes
    pub yes_pool: Amount,

    /// Net-of-fee NO stakes
    pub no_pool: Amount,

    /// 10% skim from every stake
    pub bounty_pool: Amount,

    pub status: MarketStatus,

    /// Winning side, set at resolution
    pub correct_answer: Option<Side>,

    /// Admin-attested instant the event happened
    pub actual_timestamp: Option<Timestamp>,

    /// Identity verified as having caused the event
    pub bounty_claimant: Option<String>,

    pub created_at: Timestamp,

    #[serde(default)]
    pub settlement: Option<SettlementSummary>,
}

impl Market {
    pub fn pool(&self, side: Side) -> Amount {
        match side {
            Side::Yes => self.yes_pool,
            Side::No => self.no_pool,
        }
    }

    pub fn pool_mut(&mut self, side: Side) -> &mut Amount {
        match side {
            Side::Yes => &mut self.yes_pool,
            Side::No => &mut self.no_pool,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status.is_terminal()
    }
}

/// One bettor's wager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub id: StakeId,
    pub market_id: MarketId,
    pub staker: String,
    pub side: Side,

    /// Gross amount before the 90/10 split
    pub amount: Amount,

    /// Share credited to the side's pool (90%)
    pub pool_contribution: Amount,

    /// Share credited to the bounty pool (10%)
    pub bounty_contribution: Amount,

    /// Staker's guess of when the event happens, always after the deadline
    pub timestamp_guess: Timestamp,

    pub created_at: Timestamp,
}

/// A market together with every stake recorded against it.
/// This is the durable unit written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketBook {
    pub market: Market,
    pub stakes: Vec<Stake>,
}

impl MarketBook {
    pub fn new(market: Market) -> Self {
        Self { market, stakes: Vec::new() }
    }

    pub fn next_stake_id(&self) -> StakeId {
        self.stakes.last().map(|s| s.id + 1).unwrap_or(1)
    }
}

// ============================================================================
// API REQUEST/RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMarketRequest {
    pub question: String,
    #[serde(default)]
    pub description: String,
    pub deadline: Timestamp,
    pub resolution_date: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceStakeRequest {
    pub side: Side,
    pub amount: Amount,
    pub timestamp_guess: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyBountyRequest {
    pub claimant: String,
    pub actual_timestamp: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveMarketRequest {
    pub correct_answer: Side,
    pub actual_timestamp: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAdminRequest {
    pub new_admin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetRequest {
    pub address: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutQuery {
    pub side: Side,
    pub amount: Amount,
}

/// Market plus the figures the display layer shows next to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketView {
    #[serde(flatten)]
    pub market: Market,
    pub phase: MarketStatus,
    pub total_pool: Amount,
    pub total_pool_display: String,
    pub yes_odds: rust_decimal::Decimal,
    pub no_odds: rust_decimal::Decimal,
    pub time_remaining: String,
}
