//! Market lifecycle: Active → Closed → Resolved
//!
//! `Closed` is never stored. It is the predicate `now >= deadline` on a market
//! whose stored status is still `Active`. `Resolved` is terminal and only the
//! admin resolution path sets it. Resolution before the deadline is allowed;
//! the admin decides when an event has happened.

use std::sync::{Arc, PoisonError, RwLock};

use super::MarketError;
use crate::models::{Market, MarketStatus, Timestamp};
use crate::persistence::{MarketStore, MemoryStore};

/// Effective phase of a market at `now`
pub fn phase(market: &Market, now: Timestamp) -> MarketStatus {
    match market.status {
        MarketStatus::Resolved => MarketStatus::Resolved,
        _ if now >= market.deadline => MarketStatus::Closed,
        _ => MarketStatus::Active,
    }
}

pub fn ensure_accepting_stakes(market: &Market, now: Timestamp) -> Result<(), MarketError> {
    if market.status != MarketStatus::Active {
        return Err(MarketError::MarketNotActive(market.id));
    }
    if now >= market.deadline {
        return Err(MarketError::DeadlinePassed {
            market_id: market.id,
            deadline: market.deadline,
            now,
        });
    }
    Ok(())
}

/// Resolution and bounty verification are only valid before resolution
pub fn ensure_unresolved(market: &Market) -> Result<(), MarketError> {
    if market.is_resolved() {
        return Err(MarketError::AlreadyResolved(market.id));
    }
    Ok(())
}

// ============================================================================
// ADMIN ROLE
// ============================================================================

/// The single identity allowed to verify bounty claims and resolve markets.
/// Only the current admin can hand the role over; each handover is written
/// to the store before it takes effect. No history is kept.
pub struct AdminRole {
    admin: RwLock<String>,
    store: Arc<dyn MarketStore>,
}

impl AdminRole {
    pub fn new(admin: impl Into<String>) -> Self {
        Self::with_store(admin, Arc::new(MemoryStore))
    }

    pub fn with_store(admin: impl Into<String>, store: Arc<dyn MarketStore>) -> Self {
        Self { admin: RwLock::new(admin.into()), store }
    }

    pub fn current(&self) -> String {
        self.admin.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_admin(&self, caller: &str) -> bool {
        *self.admin.read().unwrap_or_else(PoisonError::into_inner) == caller
    }

    pub fn ensure_admin(&self, caller: &str) -> Result<(), MarketError> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(MarketError::Unauthorized(caller.to_string()))
        }
    }

    /// Replace the admin, returning the previous one
    pub fn transfer(&self, caller: &str, new_admin: &str) -> Result<String, MarketError> {
        let mut admin = self.admin.write().unwrap_or_else(PoisonError::into_inner);
        if *admin != caller {
            return Err(MarketError::Unauthorized(caller.to_string()));
        }
        self.store.save_admin(new_admin)?;
        Ok(std::mem::replace(&mut *admin, new_admin.to_string()))
    }
}
