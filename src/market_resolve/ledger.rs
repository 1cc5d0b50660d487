/// Stake Ledger
///
/// Authoritative store of markets and their stakes. Every accepted stake is
/// split 90/10 between the chosen side's pool and the bounty pool.
///
/// CONCURRENCY:
/// - Each market lives behind its own `Mutex`; pool read-modify-write and the
///   whole settlement sequence run under that lock
/// - The map of markets is behind a `RwLock` only for insertion and lookup,
///   so operations on different markets proceed in parallel
/// - Mutations are applied to a copy, written through the `MarketStore`, and
///   only then swapped in, so a failed write leaves memory untouched

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use sha2::{Digest, Sha256};

use super::lifecycle;
use super::odds::split_stake;
use super::MarketError;
use crate::models::{Amount, Market, MarketBook, MarketId, MarketStatus, Side, Stake, Timestamp};
use crate::persistence::{MarketStore, MemoryStore};

/// Shared handle to one market's book
pub type BookHandle = Arc<Mutex<MarketBook>>;

pub struct StakeLedger {
    books: RwLock<BTreeMap<MarketId, BookHandle>>,
    /// Held across the first save of a new market so ids stay gapless
    next_market_id: Mutex<MarketId>,
    store: Arc<dyn MarketStore>,
    restored_admin: Option<String>,
}

impl StakeLedger {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self {
            books: RwLock::new(BTreeMap::new()),
            next_market_id: Mutex::new(1),
            store,
            restored_admin: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore))
    }

    /// Rebuild the ledger from every book the store holds.
    /// Market ids resume after the highest persisted id.
    pub fn open(store: Arc<dyn MarketStore>) -> Result<Self, MarketError> {
        let persisted = store.load_all()?;
        let restored_admin = store.load_admin()?;
        let mut ledger = Self::new(store);
        ledger.restored_admin = restored_admin;

        let mut highest = 0;
        {
            let mut books = ledger.books.write().unwrap_or_else(PoisonError::into_inner);
            for book in persisted {
                highest = highest.max(book.market.id);
                books.insert(book.market.id, Arc::new(Mutex::new(book)));
            }
            tracing::info!(markets = books.len(), "stake ledger restored from store");
        }
        *ledger.next_market_id.lock().unwrap_or_else(PoisonError::into_inner) = highest + 1;

        Ok(ledger)
    }

    pub fn store(&self) -> &Arc<dyn MarketStore> {
        &self.store
    }

    /// Admin recorded in the store by the last handover
    pub fn restored_admin(&self) -> Option<&str> {
        self.restored_admin.as_deref()
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    pub fn create_market(
        &self,
        question: &str,
        description: &str,
        deadline: Timestamp,
        resolution_date: Timestamp,
        creator: &str,
        now: Timestamp,
    ) -> Result<Market, MarketError> {
        if deadline <= now {
            return Err(MarketError::InvalidTiming(format!(
                "deadline {} must be in the future (now {})",
                deadline, now
            )));
        }
        if resolution_date <= deadline {
            return Err(MarketError::InvalidTiming(format!(
                "resolution date {} must be after deadline {}",
                resolution_date, deadline
            )));
        }

        let mut next_id = self.next_market_id.lock().unwrap_or_else(PoisonError::into_inner);
        let market = Market {
            id: *next_id,
            question: question.to_string(),
            description: description.to_string(),
            creator: creator.to_string(),
            deadline,
            resolution_date,
            yes_pool: 0,
            no_pool: 0,
            bounty_pool: 0,
            status: MarketStatus::Active,
            correct_answer: None,
            actual_timestamp: None,
            bounty_claimant: None,
            created_at: now,
            settlement: None,
        };

        let book = MarketBook::new(market.clone());
        self.store.save(&book)?;
        *next_id += 1;
        drop(next_id);

        self.books
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(market.id, Arc::new(Mutex::new(book)));

        Ok(market)
    }

    /// Record a stake with no funds movement (pure accounting)
    pub fn record_stake(
        &self,
        market_id: MarketId,
        side: Side,
        amount: Amount,
        timestamp_guess: Timestamp,
        staker: &str,
        now: Timestamp,
    ) -> Result<Stake, MarketError> {
        let handle = self.handle(market_id)?;
        let mut book = lock_book(&handle);
        let (updated, stake) = prepare_stake(&book, side, amount, timestamp_guess, staker, now)?;
        self.commit(&mut book, updated)?;
        Ok(stake)
    }

    /// Write `updated` through the store, then replace the locked book with it
    pub fn commit(&self, book: &mut MarketBook, updated: MarketBook) -> Result<(), MarketError> {
        self.persist(&updated)?;
        *book = updated;
        Ok(())
    }

    pub fn persist(&self, book: &MarketBook) -> Result<(), MarketError> {
        self.store.save(book).map_err(MarketError::from)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn handle(&self, market_id: MarketId) -> Result<BookHandle, MarketError> {
        self.books
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&market_id)
            .cloned()
            .ok_or(MarketError::MarketNotFound(market_id))
    }

    pub fn get_market(&self, market_id: MarketId) -> Result<Market, MarketError> {
        let handle = self.handle(market_id)?;
        let book = lock_book(&handle);
        Ok(book.market.clone())
    }

    /// Every stake ever recorded for the market, in insertion order
    pub fn list_stakes(&self, market_id: MarketId) -> Result<Vec<Stake>, MarketError> {
        let handle = self.handle(market_id)?;
        let book = lock_book(&handle);
        Ok(book.stakes.clone())
    }

    pub fn list_markets(&self) -> Vec<Market> {
        self.handles()
            .iter()
            .map(|handle| lock_book(handle).market.clone())
            .collect()
    }

    pub fn stakes_by_staker(&self, staker: &str) -> Vec<Stake> {
        self.handles()
            .iter()
            .flat_map(|handle| {
                lock_book(handle)
                    .stakes
                    .iter()
                    .filter(|s| s.staker == staker)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// SHA-256 over the bincode encoding of the market and its stakes
    pub fn digest(&self, market_id: MarketId) -> Result<String, MarketError> {
        let handle = self.handle(market_id)?;
        let book = lock_book(&handle);
        book_digest(&book)
    }

    pub fn market_count(&self) -> usize {
        self.books.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn handles(&self) -> Vec<BookHandle> {
        self.books
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

/// Lock a market book. A panic while holding the lock cannot leave a
/// half-applied mutation because books are only ever replaced whole.
pub fn lock_book(handle: &BookHandle) -> MutexGuard<'_, MarketBook> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn book_digest(book: &MarketBook) -> Result<String, MarketError> {
    let bytes = bincode::serialize(book).map_err(|e| MarketError::Storage(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Validate a stake against the locked book and build the updated copy.
/// Nothing is mutated here.
pub fn prepare_stake(
    book: &MarketBook,
    side: Side,
    amount: Amount,
    timestamp_guess: Timestamp,
    staker: &str,
    now: Timestamp,
) -> Result<(MarketBook, Stake), MarketError> {
    let market = &book.market;
    lifecycle::ensure_accepting_stakes(market, now)?;

    if amount == 0 {
        return Err(MarketError::InvalidAmount(amount));
    }
    if timestamp_guess <= market.deadline {
        return Err(MarketError::InvalidTimestampGuess {
            guess: timestamp_guess,
            deadline: market.deadline,
        });
    }

    let (pool_share, bounty_share) = split_stake(amount);

    let mut updated = book.clone();
    {
        let market = &mut updated.market;
        let side_pool = market.pool_mut(side);
        *side_pool = side_pool
            .checked_add(pool_share)
            .ok_or(MarketError::InvalidAmount(amount))?;
        market.bounty_pool = market
            .bounty_pool
            .checked_add(bounty_share)
            .ok_or(MarketError::InvalidAmount(amount))?;
    }

    let stake = Stake {
        id: book.next_stake_id(),
        market_id: market.id,
        staker: staker.to_string(),
        side,
        amount,
        pool_contribution: pool_share,
        bounty_contribution: bounty_share,
        timestamp_guess,
        created_at: now,
    };
    updated.stakes.push(stake.clone());

    Ok((updated, stake))
}
