//! Odds & payout calculator.
//!
//! Pure functions over a market snapshot. Every amount is an integer in the
//! token's smallest unit and every division truncates, using the same split
//! the ledger applies when a stake is recorded, so previews and settlement
//! reconcile exactly with the pools.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::{Amount, Market, Side};

/// Share of every stake routed to the bounty pool, in basis points (10%)
pub const BOUNTY_FEE_BPS: u64 = 1_000;

pub const BPS_DENOMINATOR: u64 = 10_000;

/// Split a gross stake into `(pool_share, bounty_share)`.
/// The bounty share truncates; the remainder goes to the side's pool.
pub fn split_stake(amount: Amount) -> (Amount, Amount) {
    let bounty_share = mul_div(amount, BOUNTY_FEE_BPS, BPS_DENOMINATOR);
    (amount - bounty_share, bounty_share)
}

/// `a * b / c` with a 128-bit intermediate, truncating toward zero.
/// Returns 0 when `c == 0`.
pub fn mul_div(a: Amount, b: Amount, c: Amount) -> Amount {
    if c == 0 {
        return 0;
    }
    let wide = (a as u128) * (b as u128) / (c as u128);
    Amount::try_from(wide).unwrap_or(Amount::MAX)
}

/// Winner's payout: `contribution / winning_pool` of the combined pool
pub fn proportional_payout(contribution: Amount, winning_pool: Amount, losing_pool: Amount) -> Amount {
    let combined = winning_pool.saturating_add(losing_pool);
    mul_div(combined, contribution, winning_pool)
}

/// Display odds in percent, one decimal place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Odds {
    pub yes: Decimal,
    pub no: Decimal,
}

pub fn calculate_odds(market: &Market) -> Odds {
    if market.yes_pool == 0 && market.no_pool == 0 {
        return Odds { yes: dec!(50), no: dec!(50) };
    }

    let yes_pool = Decimal::from(market.yes_pool);
    let total = yes_pool + Decimal::from(market.no_pool);
    let yes = (yes_pool * dec!(100) / total).round_dp(1);
    Odds { yes, no: dec!(100) - yes }
}

pub fn calculate_total_pool(market: &Market) -> Amount {
    market
        .yes_pool
        .saturating_add(market.no_pool)
        .saturating_add(market.bounty_pool)
}

/// What `stake_amount` on `side` would pay if that side won and nobody else
/// joined before settlement. Later stakes dilute the real payout; this preview
/// does not model them.
pub fn calculate_potential_payout(market: &Market, side: Side, stake_amount: Amount) -> Amount {
    if stake_amount == 0 {
        return 0;
    }

    let (contribution, _) = split_stake(stake_amount);
    let new_side_pool = market.pool(side).saturating_add(contribution);
    proportional_payout(contribution, new_side_pool, market.pool(side.opposite()))
}
