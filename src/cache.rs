//! Read-through cache for the query/display layer.
//!
//! Snapshots are fetched from the `MarketManager` on a miss or once they are
//! older than `max_age_secs`. Every write routed through the cache drops the
//! entries of the market it touched, so the next read refetches. The cache is
//! never consulted by staking or settlement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::market_resolve::{MarketError, MarketManager};
use crate::models::{Amount, Market, MarketId, SettlementSummary, Side, Stake, StakeId, Timestamp};

#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    fetched_at: Timestamp,
}

/// Cached snapshots plus a counter bumped on every invalidation. A fetch
/// started before an invalidation is not stored once it finishes.
#[derive(Debug)]
struct Slots<T> {
    entries: HashMap<MarketId, Cached<T>>,
    generation: u64,
}

impl<T> Slots<T> {
    fn new() -> Mutex<Self> {
        Mutex::new(Self { entries: HashMap::new(), generation: 0 })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct MarketCache {
    manager: Arc<MarketManager>,
    max_age_secs: u64,
    markets: Mutex<Slots<Market>>,
    stakes: Mutex<Slots<Vec<Stake>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MarketCache {
    pub fn new(manager: Arc<MarketManager>, max_age_secs: u64) -> Self {
        Self {
            manager,
            max_age_secs,
            markets: Slots::new(),
            stakes: Slots::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn manager(&self) -> &Arc<MarketManager> {
        &self.manager
    }

    pub fn get_market(&self, market_id: MarketId) -> Result<Market, MarketError> {
        let now = self.manager.now();
        read_through(&self.markets, market_id, now, self.max_age_secs, &self.hits, &self.misses, || {
            self.manager.get_market(market_id)
        })
    }

    pub fn list_stakes(&self, market_id: MarketId) -> Result<Vec<Stake>, MarketError> {
        let now = self.manager.now();
        read_through(&self.stakes, market_id, now, self.max_age_secs, &self.hits, &self.misses, || {
            self.manager.list_stakes(market_id)
        })
    }

    pub fn invalidate(&self, market_id: MarketId) {
        evict(&self.markets, Some(market_id));
        evict(&self.stakes, Some(market_id));
    }

    pub fn clear(&self) {
        evict(&self.markets, None);
        evict(&self.stakes, None);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    // ========================================================================
    // WRITES (refetch-on-write)
    // ========================================================================

    pub fn place_stake(
        &self,
        staker: &str,
        market_id: MarketId,
        side: Side,
        amount: Amount,
        timestamp_guess: Timestamp,
    ) -> Result<StakeId, MarketError> {
        let result = self.manager.place_stake(staker, market_id, side, amount, timestamp_guess);
        self.invalidate(market_id);
        result
    }

    pub fn verify_bounty_claim(
        &self,
        caller: &str,
        market_id: MarketId,
        claimant: &str,
        actual_timestamp: Timestamp,
    ) -> Result<(), MarketError> {
        let result = self.manager.verify_bounty_claim(caller, market_id, claimant, actual_timestamp);
        self.invalidate(market_id);
        result
    }

    pub fn resolve_market(
        &self,
        caller: &str,
        market_id: MarketId,
        correct_answer: Side,
        actual_timestamp: Timestamp,
    ) -> Result<SettlementSummary, MarketError> {
        let result = self.manager.resolve_market(caller, market_id, correct_answer, actual_timestamp);
        self.invalidate(market_id);
        result
    }
}

/// Drop one market's snapshot, or all of them with `None`
fn evict<T>(slots: &Mutex<Slots<T>>, market_id: Option<MarketId>) {
    let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
    slots.generation += 1;
    match market_id {
        Some(id) => {
            slots.entries.remove(&id);
        }
        None => slots.entries.clear(),
    }
}

fn read_through<T: Clone>(
    slots: &Mutex<Slots<T>>,
    market_id: MarketId,
    now: Timestamp,
    max_age_secs: u64,
    hits: &AtomicU64,
    misses: &AtomicU64,
    fetch: impl FnOnce() -> Result<T, MarketError>,
) -> Result<T, MarketError> {
    let generation = {
        let slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = slots.entries.get(&market_id) {
            if now.saturating_sub(cached.fetched_at) < max_age_secs {
                hits.fetch_add(1, Ordering::Relaxed);
                return Ok(cached.value.clone());
            }
        }
        slots.generation
    };

    misses.fetch_add(1, Ordering::Relaxed);
    let value = fetch()?;

    let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
    if slots.generation == generation {
        slots
            .entries
            .insert(market_id, Cached { value: value.clone(), fetched_at: now });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::market_resolve::StakeLedger;
    use crate::models::TOKEN_UNIT;
    use crate::vault::TokenVault;

    const NOW: Timestamp = 1_700_000_000;
    const DAY: Timestamp = 86_400;

    fn setup(max_age: u64) -> (MarketCache, Arc<ManualClock>, MarketId) {
        let vault = Arc::new(TokenVault::new());
        vault.mint("bob", 10 * TOKEN_UNIT).unwrap();
        let clock = Arc::new(ManualClock::new(NOW));
        let manager = Arc::new(MarketManager::new(StakeLedger::in_memory(), "admin", vault, clock.clone()));
        let id = manager
            .create_market("creator", "Q", "", NOW + DAY, NOW + 2 * DAY)
            .unwrap();
        (MarketCache::new(manager, max_age), clock, id)
    }

    #[test]
    fn test_second_read_is_a_hit() {
        let (cache, _clock, id) = setup(60);
        cache.get_market(id).unwrap();
        cache.get_market(id).unwrap();
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_write_through_cache_refetches() {
        let (cache, _clock, id) = setup(60);
        assert_eq!(cache.get_market(id).unwrap().yes_pool, 0);
        assert!(cache.list_stakes(id).unwrap().is_empty());

        cache.place_stake("bob", id, Side::Yes, TOKEN_UNIT, NOW + DAY + 1).unwrap();

        assert_eq!(cache.get_market(id).unwrap().yes_pool, 900_000);
        assert_eq!(cache.list_stakes(id).unwrap().len(), 1);
    }

    #[test]
    fn test_direct_write_is_stale_until_expiry() {
        let (cache, clock, id) = setup(5);
        cache.get_market(id).unwrap();

        // bypasses the cache, so no invalidation
        cache
            .manager()
            .place_stake("bob", id, Side::No, TOKEN_UNIT, NOW + DAY + 1)
            .unwrap();
        assert_eq!(cache.get_market(id).unwrap().no_pool, 0);

        clock.advance(5);
        assert_eq!(cache.get_market(id).unwrap().no_pool, 900_000);
    }

    #[test]
    fn test_missing_market_not_cached() {
        let (cache, _clock, _id) = setup(60);
        assert_eq!(cache.get_market(77), Err(MarketError::MarketNotFound(77)));
        assert_eq!(cache.get_market(77), Err(MarketError::MarketNotFound(77)));
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_write_during_fetch_is_not_masked() {
        let (cache, _clock, id) = setup(60);

        // A write and its invalidation land while the old snapshot is in flight
        let stale = read_through(&cache.markets, id, NOW, 60, &cache.hits, &cache.misses, || {
            let snapshot = cache.manager().get_market(id);
            cache.place_stake("bob", id, Side::Yes, TOKEN_UNIT, NOW + DAY + 1).unwrap();
            snapshot
        })
        .unwrap();
        assert_eq!(stale.yes_pool, 0);

        assert_eq!(cache.get_market(id).unwrap().yes_pool, 900_000);
    }
}
