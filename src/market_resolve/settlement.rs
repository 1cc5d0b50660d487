//! Settlement Engine
//!
//! Resolution is planned as a pure computation over the locked market book,
//! then executed as one credit batch. If the batch fails nothing is applied
//! and the market stays unresolved, so resolution can be retried.
//!
//! Each winning stake is paid `combined_pool * contribution / winning_pool`,
//! truncated. The few units lost to truncation (at most one per winning
//! stake), the whole combined pool of a market with no winning stakes, and a
//! bounty nobody was verified for all stay in escrow as `unclaimed`.

use serde::{Deserialize, Serialize};

use super::odds::proportional_payout;
use crate::models::{Amount, MarketBook, MarketId, MarketStatus, SettlementSummary, Side, StakeId, Timestamp};
use crate::vault::Credit;

/// Payout owed to one winning stake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub stake_id: StakeId,
    pub staker: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountyPayout {
    pub claimant: String,
    pub amount: Amount,
}

/// Everything a resolution will transfer, computed before any funds move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub market_id: MarketId,
    pub correct_answer: Side,
    pub payouts: Vec<Payout>,
    pub bounty: Option<BountyPayout>,
    /// Combined pool not paid to winners: truncation dust, or the whole
    /// pool when nobody backed the winning side
    pub pool_residue: Amount,
    pub summary: SettlementSummary,
}

impl SettlementPlan {
    /// Credits for the transfer service, zero-value entries dropped
    pub fn credits(&self) -> Vec<Credit> {
        let winnings = self.payouts.iter().map(|p| Credit::new(&p.staker, p.amount));
        let bounty = self.bounty.iter().map(|b| Credit::new(&b.claimant, b.amount));
        winnings.chain(bounty).filter(|c| c.amount > 0).collect()
    }
}

/// Compute payouts for resolving `book` in favour of `correct_answer`
pub fn plan_settlement(book: &MarketBook, correct_answer: Side, now: Timestamp) -> SettlementPlan {
    let market = &book.market;
    let winning_pool = market.pool(correct_answer);
    let losing_pool = market.pool(correct_answer.opposite());
    let combined = winning_pool.saturating_add(losing_pool);

    let payouts: Vec<Payout> = if winning_pool == 0 {
        Vec::new()
    } else {
        book.stakes
            .iter()
            .filter(|stake| stake.side == correct_answer)
            .map(|stake| Payout {
                stake_id: stake.id,
                staker: stake.staker.clone(),
                amount: proportional_payout(stake.pool_contribution, winning_pool, losing_pool),
            })
            .collect()
    };

    let winnings_paid: Amount = payouts.iter().map(|p| p.amount).sum();
    let pool_residue = combined.saturating_sub(winnings_paid);
    if !payouts.is_empty() {
        debug_assert!(pool_residue <= payouts.len() as Amount, "rounding residue exceeds winner count");
        if pool_residue > payouts.len() as Amount {
            tracing::warn!(market_id = market.id, pool_residue, winners = payouts.len(), "settlement residue above bound");
        }
    }

    let bounty = market.bounty_claimant.as_ref().map(|claimant| BountyPayout {
        claimant: claimant.clone(),
        amount: market.bounty_pool,
    });
    let bounty_paid = bounty.as_ref().map(|b| b.amount).unwrap_or(0);
    let bounty_residue = market.bounty_pool - bounty_paid;

    SettlementPlan {
        market_id: market.id,
        correct_answer,
        summary: SettlementSummary {
            winning_stakes: payouts.len() as u64,
            winnings_paid,
            bounty_paid,
            unclaimed: pool_residue + bounty_residue,
            resolved_at: now,
        },
        payouts,
        bounty,
        pool_residue,
    }
}

/// The resolved copy of `book`: terminal status, drained pools, summary kept
pub fn apply_resolution(book: &MarketBook, plan: &SettlementPlan, actual_timestamp: Timestamp) -> MarketBook {
    let mut resolved = book.clone();
    let market = &mut resolved.market;
    market.status = MarketStatus::Resolved;
    market.correct_answer = Some(plan.correct_answer);
    market.actual_timestamp = Some(actual_timestamp);
    market.yes_pool = 0;
    market.no_pool = 0;
    market.bounty_pool = 0;
    market.settlement = Some(plan.summary.clone());
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_resolve::ledger::StakeLedger;
    use crate::models::TOKEN_UNIT;

    const NOW: Timestamp = 1_700_000_000;
    const DAY: Timestamp = 86_400;

    fn book_with(stakes: &[(&str, Side, Amount)]) -> MarketBook {
        let ledger = StakeLedger::in_memory();
        let market = ledger
            .create_market("Q", "", NOW + DAY, NOW + 2 * DAY, "creator", NOW)
            .unwrap();
        for (staker, side, amount) in stakes {
            ledger
                .record_stake(market.id, *side, *amount, NOW + DAY + 60, staker, NOW)
                .unwrap();
        }
        let handle = ledger.handle(market.id).unwrap();
        let book = handle.lock().unwrap().clone();
        book
    }

    #[test]
    fn test_sole_winner_takes_combined_pool() {
        let book = book_with(&[("bob", Side::Yes, TOKEN_UNIT), ("carol", Side::No, 2 * TOKEN_UNIT)]);
        let plan = plan_settlement(&book, Side::Yes, NOW);

        assert_eq!(plan.payouts.len(), 1);
        assert_eq!(plan.payouts[0].staker, "bob");
        assert_eq!(plan.payouts[0].amount, 2_700_000);
        assert_eq!(plan.pool_residue, 0);
        // no claimant: bounty stays in escrow
        assert!(plan.bounty.is_none());
        assert_eq!(plan.summary.unclaimed, 300_000);
    }

    #[test]
    fn test_proportional_split_between_winners() {
        let book = book_with(&[
            ("bob", Side::No, TOKEN_UNIT),
            ("carol", Side::No, 3 * TOKEN_UNIT),
            ("dave", Side::Yes, 4 * TOKEN_UNIT),
        ]);
        let plan = plan_settlement(&book, Side::No, NOW);

        // no pool 3.6, yes pool 3.6, combined 7.2
        assert_eq!(plan.payouts[0].amount, 1_800_000);
        assert_eq!(plan.payouts[1].amount, 5_400_000);
        assert_eq!(plan.summary.winnings_paid, 7_200_000);
        assert_eq!(plan.summary.winning_stakes, 2);
    }

    #[test]
    fn test_rounding_dust_bounded_by_winner_count() {
        let book = book_with(&[
            ("a", Side::Yes, 7),
            ("b", Side::Yes, 11),
            ("c", Side::Yes, 13),
            ("d", Side::No, 1_000_003),
        ]);
        let plan = plan_settlement(&book, Side::Yes, NOW);
        let combined = book.market.yes_pool + book.market.no_pool;

        assert!(plan.pool_residue <= plan.payouts.len() as Amount);
        assert_eq!(plan.summary.winnings_paid + plan.pool_residue, combined);
    }

    #[test]
    fn test_empty_winning_side_leaves_pool_unclaimed() {
        let book = book_with(&[("bob", Side::No, TOKEN_UNIT)]);
        let plan = plan_settlement(&book, Side::Yes, NOW);

        assert!(plan.payouts.is_empty());
        assert_eq!(plan.pool_residue, 900_000);
        assert_eq!(plan.summary.unclaimed, TOKEN_UNIT);
        assert!(plan.credits().is_empty());
    }

    #[test]
    fn test_bounty_goes_to_verified_claimant() {
        let mut book = book_with(&[("bob", Side::Yes, TOKEN_UNIT), ("carol", Side::No, TOKEN_UNIT)]);
        book.market.bounty_claimant = Some("hero".into());
        let plan = plan_settlement(&book, Side::Yes, NOW);

        assert_eq!(plan.bounty, Some(BountyPayout { claimant: "hero".into(), amount: 200_000 }));
        assert_eq!(plan.summary.bounty_paid, 200_000);
        assert_eq!(plan.summary.unclaimed, 0);

        let credits = plan.credits();
        assert_eq!(credits, vec![Credit::new("bob", 1_800_000), Credit::new("hero", 200_000)]);
    }

    #[test]
    fn test_conservation_across_plan() {
        let stakes = [
            ("a", Side::Yes, 1_234_567),
            ("b", Side::No, 89),
            ("c", Side::Yes, 3),
            ("d", Side::No, 5_555_555),
            ("e", Side::Yes, 42),
        ];
        let gross: Amount = stakes.iter().map(|s| s.2).sum();
        let mut book = book_with(&stakes);
        book.market.bounty_claimant = Some("hero".into());

        for side in [Side::Yes, Side::No] {
            let s = plan_settlement(&book, side, NOW).summary;
            assert_eq!(s.winnings_paid + s.bounty_paid + s.unclaimed, gross);
        }
    }

    #[test]
    fn test_apply_resolution_drains_pools() {
        let book = book_with(&[("bob", Side::Yes, TOKEN_UNIT), ("carol", Side::No, TOKEN_UNIT)]);
        let plan = plan_settlement(&book, Side::No, NOW + 10);
        let resolved = apply_resolution(&book, &plan, NOW + 5);

        let market = &resolved.market;
        assert_eq!(market.status, MarketStatus::Resolved);
        assert_eq!(market.correct_answer, Some(Side::No));
        assert_eq!(market.actual_timestamp, Some(NOW + 5));
        assert_eq!((market.yes_pool, market.no_pool, market.bounty_pool), (0, 0, 0));
        assert_eq!(market.settlement.as_ref().unwrap().resolved_at, NOW + 10);
        // stakes are kept for audit
        assert_eq!(resolved.stakes, book.stakes);
    }
}
