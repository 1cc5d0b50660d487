// ============================================================================
// Market Resolve Module - Core Market, Staking & Settlement Logic
// ============================================================================
//
// This module contains the pool-accounting core of the bounty market:
//   - ledger: authoritative store of markets and stakes (90/10 split)
//   - odds: odds, total pool and payout previews over a market snapshot
//   - lifecycle: Active → Closed → Resolved predicates and the admin role
//   - settlement: one-shot payout planning for a resolved market
//   - markets: MarketManager, the operations exposed to callers
//
// ============================================================================

pub mod ledger;
pub mod odds;
pub mod lifecycle;
pub mod settlement;
pub mod markets;

pub use ledger::*;
pub use odds::*;
pub use lifecycle::*;
pub use settlement::*;
pub use markets::*;

use crate::models::{Amount, MarketId, Timestamp};
use crate::persistence::StoreError;
use crate::vault::TransferError;

// ============================================================================
// ERRORS
// ============================================================================

/// Every failure a core market operation can surface to its caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// Deadline not in the future, or resolution date not after the deadline
    InvalidTiming(String),
    MarketNotFound(MarketId),
    MarketNotActive(MarketId),
    DeadlinePassed { market_id: MarketId, deadline: Timestamp, now: Timestamp },
    InvalidAmount(Amount),
    InvalidTimestampGuess { guess: Timestamp, deadline: Timestamp },
    Unauthorized(String),
    AlreadyResolved(MarketId),
    TransferFailed(String),
    /// The backing store could not persist or load market records
    Storage(String),
}

impl MarketError {
    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::InvalidTiming(_) => "InvalidTiming",
            MarketError::MarketNotFound(_) => "MarketNotFound",
            MarketError::MarketNotActive(_) => "MarketNotActive",
            MarketError::DeadlinePassed { .. } => "DeadlinePassed",
            MarketError::InvalidAmount(_) => "InvalidAmount",
            MarketError::InvalidTimestampGuess { .. } => "InvalidTimestampGuess",
            MarketError::Unauthorized(_) => "Unauthorized",
            MarketError::AlreadyResolved(_) => "AlreadyResolved",
            MarketError::TransferFailed(_) => "TransferFailed",
            MarketError::Storage(_) => "Storage",
        }
    }
}

impl std::fmt::Display for MarketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketError::InvalidTiming(msg) => write!(f, "Invalid timing: {}", msg),
            MarketError::MarketNotFound(id) => write!(f, "Market not found: {}", id),
            MarketError::MarketNotActive(id) => write!(f, "Market {} is not active", id),
            MarketError::DeadlinePassed { market_id, deadline, now } => {
                write!(f, "Betting closed on market {}: deadline {} reached (now {})", market_id, deadline, now)
            }
            MarketError::InvalidAmount(amount) => write!(f, "Invalid amount: {}", amount),
            MarketError::InvalidTimestampGuess { guess, deadline } => {
                write!(f, "Timestamp guess {} must be after deadline {}", guess, deadline)
            }
            MarketError::Unauthorized(caller) => write!(f, "Only admin: {} is not authorized", caller),
            MarketError::AlreadyResolved(id) => write!(f, "Market {} is already resolved", id),
            MarketError::TransferFailed(msg) => write!(f, "Transfer failed: {}", msg),
            MarketError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for MarketError {}

impl From<TransferError> for MarketError {
    fn from(err: TransferError) -> Self {
        MarketError::TransferFailed(err.to_string())
    }
}

impl From<StoreError> for MarketError {
    fn from(err: StoreError) -> Self {
        MarketError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_converts_to_transfer_failed() {
        let err: MarketError = TransferError::InsufficientEscrow { available: 1, requested: 2 }.into();
        assert_eq!(err.kind(), "TransferFailed");
        assert!(err.to_string().contains("escrow"));
    }

    #[test]
    fn test_error_display_carries_context() {
        let err = MarketError::InvalidTimestampGuess { guess: 10, deadline: 10 };
        assert_eq!(err.to_string(), "Timestamp guess 10 must be after deadline 10");
        assert_eq!(MarketError::MarketNotFound(7).to_string(), "Market not found: 7");
    }
}
