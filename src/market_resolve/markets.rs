use std::sync::Arc;

use super::ledger::{lock_book, prepare_stake, StakeLedger};
use super::lifecycle::{self, AdminRole};
use super::odds::{self, Odds};
use super::settlement::{apply_resolution, plan_settlement};
use super::MarketError;
use crate::clock::Clock;
use crate::events::{EventLog, MarketEvent};
use crate::models::{
    Amount, Market, MarketId, MarketStatus, SettlementSummary, Side, Stake, StakeId, Timestamp,
};
use crate::vault::TransferService;

/// Bounty prediction market operations
///
/// Owns the stake ledger and the admin role, and moves funds only through the
/// injected `TransferService`. All timing checks use the injected `Clock`.
pub struct MarketManager {
    ledger: StakeLedger,
    admin: AdminRole,
    transfers: Arc<dyn TransferService>,
    clock: Arc<dyn Clock>,
    events: EventLog,
}

impl MarketManager {
    pub fn new(
        ledger: StakeLedger,
        admin: impl Into<String>,
        transfers: Arc<dyn TransferService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let admin = match ledger.restored_admin() {
            Some(restored) => restored.to_string(),
            None => admin.into(),
        };
        let admin = AdminRole::with_store(admin, ledger.store().clone());
        Self {
            ledger,
            admin,
            transfers,
            clock,
            events: EventLog::default(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn ledger(&self) -> &StakeLedger {
        &self.ledger
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ========================================================================
    // MARKETS & STAKES
    // ========================================================================

    pub fn create_market(
        &self,
        creator: &str,
        question: &str,
        description: &str,
        deadline: Timestamp,
        resolution_date: Timestamp,
    ) -> Result<MarketId, MarketError> {
        let now = self.now();
        let market = self
            .ledger
            .create_market(question, description, deadline, resolution_date, creator, now)?;

        self.events.record(
            MarketEvent::MarketCreated {
                market_id: market.id,
                creator: market.creator.clone(),
                question: market.question.clone(),
                deadline: market.deadline,
            },
            now,
        );
        Ok(market.id)
    }

    /// Debit the staker and record the stake, as one step.
    /// The market stays locked from validation to commit; if the commit fails
    /// after the debit, the debit is refunded.
    pub fn place_stake(
        &self,
        staker: &str,
        market_id: MarketId,
        side: Side,
        amount: Amount,
        timestamp_guess: Timestamp,
    ) -> Result<StakeId, MarketError> {
        let now = self.now();
        let handle = self.ledger.handle(market_id)?;
        let mut book = lock_book(&handle);

        let (updated, stake) = prepare_stake(&book, side, amount, timestamp_guess, staker, now)?;
        self.transfers.debit(staker, amount)?;

        if let Err(err) = self.ledger.commit(&mut book, updated) {
            tracing::error!(market_id, staker, amount, error = %err, "stake commit failed, refunding");
            if let Err(refund_err) = self.transfers.credit(staker, amount) {
                tracing::error!(market_id, staker, amount, error = %refund_err, "stake refund failed");
            }
            return Err(err);
        }
        drop(book);

        self.events.record(
            MarketEvent::StakePlaced {
                market_id,
                stake_id: stake.id,
                staker: stake.staker.clone(),
                side,
                amount,
                timestamp_guess,
            },
            now,
        );
        Ok(stake.id)
    }

    pub fn get_market(&self, market_id: MarketId) -> Result<Market, MarketError> {
        self.ledger.get_market(market_id)
    }

    pub fn list_markets(&self) -> Vec<Market> {
        self.ledger.list_markets()
    }

    pub fn list_stakes(&self, market_id: MarketId) -> Result<Vec<Stake>, MarketError> {
        self.ledger.list_stakes(market_id)
    }

    pub fn stakes_by_staker(&self, staker: &str) -> Vec<Stake> {
        self.ledger.stakes_by_staker(staker)
    }

    pub fn market_digest(&self, market_id: MarketId) -> Result<String, MarketError> {
        self.ledger.digest(market_id)
    }

    pub fn market_phase(&self, market_id: MarketId) -> Result<MarketStatus, MarketError> {
        let market = self.ledger.get_market(market_id)?;
        Ok(lifecycle::phase(&market, self.now()))
    }

    pub fn calculate_odds(&self, market_id: MarketId) -> Result<Odds, MarketError> {
        Ok(odds::calculate_odds(&self.ledger.get_market(market_id)?))
    }

    pub fn calculate_potential_payout(
        &self,
        market_id: MarketId,
        side: Side,
        amount: Amount,
    ) -> Result<Amount, MarketError> {
        let market = self.ledger.get_market(market_id)?;
        Ok(odds::calculate_potential_payout(&market, side, amount))
    }

    // ========================================================================
    // ADMIN OPERATIONS
    // ========================================================================

    pub fn admin(&self) -> String {
        self.admin.current()
    }

    pub fn ensure_admin(&self, caller: &str) -> Result<(), MarketError> {
        self.admin.ensure_admin(caller)
    }

    pub fn set_admin(&self, caller: &str, new_admin: &str) -> Result<(), MarketError> {
        let previous = self.admin.transfer(caller, new_admin)?;
        self.events.record(
            MarketEvent::AdminChanged { previous, new: new_admin.to_string() },
            self.now(),
        );
        Ok(())
    }

    /// Credit `claimant` with causing the event. Last write wins; no funds
    /// move until resolution.
    pub fn verify_bounty_claim(
        &self,
        caller: &str,
        market_id: MarketId,
        claimant: &str,
        actual_timestamp: Timestamp,
    ) -> Result<(), MarketError> {
        self.admin.ensure_admin(caller)?;
        let handle = self.ledger.handle(market_id)?;
        let mut book = lock_book(&handle);
        lifecycle::ensure_unresolved(&book.market)?;

        let mut updated = book.clone();
        updated.market.bounty_claimant = Some(claimant.to_string());
        updated.market.actual_timestamp = Some(actual_timestamp);
        self.ledger.commit(&mut book, updated)?;
        drop(book);

        self.events.record(
            MarketEvent::BountyClaimVerified {
                market_id,
                claimant: claimant.to_string(),
                actual_timestamp,
            },
            self.now(),
        );
        Ok(())
    }

    /// Settle the market in favour of `correct_answer`.
    ///
    /// The resolved record is persisted first, then every payout and the
    /// bounty go out as one credit batch. If the batch fails the previous
    /// record is written back and the market stays unresolved.
    ///
    /// If writing the previous record back also fails, the store still holds
    /// the resolved record while memory keeps the unresolved one. That case
    /// returns `Storage` instead of `TransferFailed`; retrying the resolution
    /// in this process rewrites the record and pays out.
    pub fn resolve_market(
        &self,
        caller: &str,
        market_id: MarketId,
        correct_answer: Side,
        actual_timestamp: Timestamp,
    ) -> Result<SettlementSummary, MarketError> {
        self.admin.ensure_admin(caller)?;
        let now = self.now();
        let handle = self.ledger.handle(market_id)?;
        let mut book = lock_book(&handle);
        lifecycle::ensure_unresolved(&book.market)?;

        let plan = plan_settlement(&book, correct_answer, now);
        let resolved = apply_resolution(&book, &plan, actual_timestamp);

        self.ledger.persist(&resolved)?;
        if let Err(err) = self.transfers.credit_batch(&plan.credits()) {
            tracing::error!(market_id, error = %err, "settlement transfer failed, rolling back");
            if let Err(restore_err) = self.ledger.persist(&book) {
                tracing::error!(market_id, error = %restore_err, "failed to restore unresolved record");
                return Err(MarketError::Storage(format!(
                    "market {} stored as resolved after failed payout ({}); restore failed: {}",
                    market_id, err, restore_err
                )));
            }
            return Err(err.into());
        }
        *book = resolved;
        drop(book);

        self.events.record(
            MarketEvent::MarketResolved { market_id, correct_answer, actual_timestamp },
            now,
        );
        for payout in &plan.payouts {
            self.events.record(
                MarketEvent::WinningsPaid {
                    market_id,
                    stake_id: payout.stake_id,
                    staker: payout.staker.clone(),
                    amount: payout.amount,
                },
                now,
            );
        }
        if let Some(bounty) = &plan.bounty {
            self.events.record(
                MarketEvent::BountyPaid {
                    market_id,
                    claimant: bounty.claimant.clone(),
                    amount: bounty.amount,
                },
                now,
            );
        }

        tracing::info!(
            market_id,
            winners = plan.summary.winning_stakes,
            paid = plan.summary.winnings_paid,
            bounty = plan.summary.bounty_paid,
            unclaimed = plan.summary.unclaimed,
            "market settled"
        );
        Ok(plan.summary)
    }
}
